use std::{
    collections::HashMap,
    env, fs,
    net::SocketAddr,
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context};
use axum::body::Body;
use axum::{
    extract::{MatchedPath, Path as ItemId, Query, State},
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::{from_fn, from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use boardbase_auth::prelude::{AuthError, CredentialResolver, RequestSnapshot, USER_BODY_FIELD};
use boardbase_chat::prelude::{
    ChatBackend, ChatBackendConfig, ChatError, ChatMessage, ChatProxy, ChatReply, ChatTurn,
    HttpChatBackend, TurnLimiter, DEFAULT_BASE_URL, DEFAULT_TURN_CAP,
};
use boardbase_errors::prelude::{codes, ErrorBuilder, ErrorObj};
use boardbase_storage::{
    errors::StorageError,
    memory::{InMemoryRepository, MemoryDatastore},
    model::{Entity, QueryParams},
    spi::repo::Repository,
};
use boardbase_types::prelude::{now_ms, Id, OwnerId};
use config::Config;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::info;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = GatewayConfig::load()?;
    let state = AppState::new(&config)?;

    let app = router(state.clone());

    let addr: SocketAddr = format!("{}:{}", config.server.address, config.server.port)
        .parse()
        .context("invalid server address/port")?;

    info!(%addr, "boardbase gateway listening");
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server failure")?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/items", get(list_items).post(create_item))
        .route(
            "/items/:id",
            get(get_item)
                .put(update_item)
                .patch(update_item)
                .delete(delete_item),
        )
        .route("/chat", get(chat_health).post(chat))
        .with_state(state.clone())
        .layer(from_fn_with_state(state, metrics_middleware))
        .layer(from_fn(request_id_middleware))
}

fn init_tracing() {
    if tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .finish(),
    )
    .is_err()
    {
        // Subscriber already set by tests or external runtime.
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
struct GatewayConfig {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    auth: AuthBootstrap,
    #[serde(default)]
    chat: ChatBootstrap,
}

impl GatewayConfig {
    fn load() -> anyhow::Result<Self> {
        let config_file = env::var("BOARDBASE_CONFIG_FILE")
            .unwrap_or_else(|_| "config/boardbase.local.toml".to_string());

        let mut builder = Config::builder()
            .set_default("server.address", ServerConfig::default_address())?
            .set_default("server.port", ServerConfig::default_port())?;

        if Path::new(&config_file).exists() {
            builder = builder.add_source(config::File::from(Path::new(&config_file)));
        }

        builder = builder.add_source(config::Environment::with_prefix("BOARDBASE").separator("__"));

        let config: GatewayConfig = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        Ok(config)
    }
}

fn resolve_secret_source(
    literal: &Option<String>,
    env_key: &Option<String>,
    file_path: &Option<String>,
    field: &str,
) -> anyhow::Result<String> {
    if let Some(env_var) = env_key.as_ref() {
        let value = env::var(env_var)
            .with_context(|| format!("environment variable {env_var} for {field} not set"))?;
        return Ok(value);
    }
    if let Some(path) = file_path.as_ref() {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read secret file {path} for {field}"))?;
        return Ok(contents.trim().to_string());
    }
    if let Some(value) = literal.as_ref() {
        if value.is_empty() {
            return Err(anyhow!("{field} literal secret cannot be empty"));
        }
        return Ok(value.clone());
    }
    Err(anyhow!(
        "{field} secret must be provided via literal/env/file"
    ))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ServerConfig {
    #[serde(default = "ServerConfig::default_address")]
    address: String,
    #[serde(default = "ServerConfig::default_port")]
    port: u16,
}

impl ServerConfig {
    fn default_address() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        8080
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: Self::default_address(),
            port: Self::default_port(),
        }
    }
}

/// Service-token bootstrap for the trusted header channel. Leaving all three
/// sources unset disables the channel; it never degrades to trust-by-header.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
struct AuthBootstrap {
    #[serde(default)]
    service_token: Option<String>,
    #[serde(default)]
    service_token_env: Option<String>,
    #[serde(default)]
    service_token_file: Option<String>,
}

impl AuthBootstrap {
    fn resolve_service_token(&self) -> anyhow::Result<Option<String>> {
        if self.service_token.is_none()
            && self.service_token_env.is_none()
            && self.service_token_file.is_none()
        {
            return Ok(None);
        }
        resolve_secret_source(
            &self.service_token,
            &self.service_token_env,
            &self.service_token_file,
            "auth.service_token",
        )
        .map(Some)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ChatBootstrap {
    #[serde(default = "ChatBootstrap::default_base_url")]
    base_url: String,
    #[serde(default = "ChatBootstrap::default_request_timeout_ms")]
    request_timeout_ms: u64,
    #[serde(default = "ChatBootstrap::default_turn_cap")]
    turn_cap: u32,
}

impl ChatBootstrap {
    fn default_base_url() -> String {
        DEFAULT_BASE_URL.to_string()
    }

    fn default_request_timeout_ms() -> u64 {
        30_000
    }

    fn default_turn_cap() -> u32 {
        DEFAULT_TURN_CAP
    }
}

impl Default for ChatBootstrap {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            request_timeout_ms: Self::default_request_timeout_ms(),
            turn_cap: Self::default_turn_cap(),
        }
    }
}

#[derive(Clone)]
struct AppState {
    resolver: Arc<CredentialResolver>,
    tasks: TaskService,
    chat: Arc<ChatProxy>,
    backend: Arc<dyn ChatBackend>,
    metrics: GatewayMetrics,
}

impl AppState {
    fn new(config: &GatewayConfig) -> anyhow::Result<Self> {
        let service_token = config.auth.resolve_service_token()?;
        let resolver = Arc::new(CredentialResolver::new(service_token));

        let datastore = MemoryDatastore::new();
        let repo: Arc<dyn Repository<TaskEntity>> =
            Arc::new(InMemoryRepository::<TaskEntity>::new(&datastore));
        let tasks = TaskService::new(repo);

        let backend_config = ChatBackendConfig::new(&config.chat.base_url)
            .context("chat backend base url")?
            .with_timeout(Duration::from_millis(config.chat.request_timeout_ms));
        let backend: Arc<dyn ChatBackend> =
            Arc::new(HttpChatBackend::new(backend_config).context("chat backend client")?);
        let chat = Arc::new(ChatProxy::new(
            backend.clone(),
            TurnLimiter::new(config.chat.turn_cap),
        ));

        Ok(Self {
            resolver,
            tasks,
            chat,
            backend,
            metrics: GatewayMetrics::default(),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TaskStatus {
    Todo,
    Doing,
    Done,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct TaskEntity {
    id: String,
    owner: OwnerId,
    title: String,
    details: String,
    status: TaskStatus,
    created_at_ms: i64,
}

impl Entity for TaskEntity {
    const TABLE: &'static str = "tasks";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner(&self) -> &OwnerId {
        &self.owner
    }
}

const TITLE_MAX_CHARS: usize = 200;
const DETAILS_MAX_CHARS: usize = 1000;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateTaskPayload {
    title: String,
    details: String,
    status: TaskStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateTaskPayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    status: Option<TaskStatus>,
}

fn validate_title(title: &str) -> Result<(), StorageError> {
    if title.trim().is_empty() {
        return Err(StorageError::bad_request("title must not be empty"));
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(StorageError::bad_request("title exceeds 200 characters"));
    }
    Ok(())
}

fn validate_details(details: &str) -> Result<(), StorageError> {
    if details.chars().count() > DETAILS_MAX_CHARS {
        return Err(StorageError::bad_request("details exceed 1000 characters"));
    }
    Ok(())
}

/// Owner-scoped task operations over the repository SPI. Every call takes the
/// resolved owner; a task id from another owner is a not-found here, not a
/// permission error.
#[derive(Clone)]
struct TaskService {
    repo: Arc<dyn Repository<TaskEntity>>,
}

impl TaskService {
    fn new(repo: Arc<dyn Repository<TaskEntity>>) -> Self {
        Self { repo }
    }

    async fn list(
        &self,
        owner: &OwnerId,
        status: Option<TaskStatus>,
    ) -> Result<Vec<TaskEntity>, StorageError> {
        let filter = match status {
            Some(status) => json!({ "status": status }),
            None => json!({}),
        };
        let page = self
            .repo
            .select(owner, QueryParams { filter, limit: None })
            .await?;
        Ok(page.items)
    }

    async fn create(
        &self,
        owner: &OwnerId,
        payload: CreateTaskPayload,
    ) -> Result<TaskEntity, StorageError> {
        validate_title(&payload.title)?;
        validate_details(&payload.details)?;
        let task = TaskEntity {
            id: Id::new_random().0,
            owner: owner.clone(),
            title: payload.title,
            details: payload.details,
            status: payload.status,
            created_at_ms: now_ms(),
        };
        self.repo.create(owner, &task).await?;
        Ok(task)
    }

    async fn get(&self, owner: &OwnerId, id: &str) -> Result<TaskEntity, StorageError> {
        self.repo
            .get(owner, id)
            .await?
            .ok_or_else(|| StorageError::not_found("no task under (owner, id)"))
    }

    async fn update(
        &self,
        owner: &OwnerId,
        id: &str,
        payload: UpdateTaskPayload,
    ) -> Result<TaskEntity, StorageError> {
        let mut patch = serde_json::Map::new();
        if let Some(title) = payload.title {
            validate_title(&title)?;
            patch.insert("title".into(), Value::String(title));
        }
        if let Some(details) = payload.details {
            validate_details(&details)?;
            patch.insert("details".into(), Value::String(details));
        }
        if let Some(status) = payload.status {
            patch.insert("status".into(), json!(status));
        }
        if patch.is_empty() {
            // An empty patch still 404s for a missing id.
            return self.get(owner, id).await;
        }
        self.repo.patch(owner, id, Value::Object(patch)).await
    }

    async fn delete(&self, owner: &OwnerId, id: &str) -> Result<(), StorageError> {
        self.repo.delete(owner, id).await
    }
}

/// Boundary error: translated to `{error, message}` with the code-table HTTP
/// status. Only the user-safe message leaves the process.
#[derive(Debug)]
struct ApiError(ErrorObj);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::warn!(code = self.0.code, "request failed");
        } else {
            tracing::debug!(code = self.0.code, "request rejected");
        }
        (status, Json(self.0.public_body())).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError(err.into_inner())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError(err.into_inner())
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        ApiError(err.into_inner())
    }
}

fn schema_error(msg: &str) -> ApiError {
    ApiError(
        ErrorBuilder::new(codes::SCHEMA_VALIDATION)
            .user_msg("Request failed validation.")
            .dev_msg(msg)
            .build(),
    )
}

fn snapshot(
    method: &Method,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
    body: Option<&Value>,
) -> RequestSnapshot {
    let mut header_map = HashMap::new();
    for (name, value) in headers.iter() {
        if let Ok(value) = value.to_str() {
            header_map.insert(name.as_str().to_string(), value.to_string());
        }
    }
    RequestSnapshot {
        method: method.as_str().to_string(),
        headers: header_map,
        query: query.clone(),
        body: body.cloned(),
    }
}

/// The body identity field belongs to resolution, not to the task schema;
/// remove it before the strict payload decode.
fn strip_identity(mut body: Value) -> Value {
    if let Some(map) = body.as_object_mut() {
        map.remove(USER_BODY_FIELD);
    }
    body
}

fn decode_payload<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|err| schema_error(&err.to_string()))
}

fn parse_status(raw: &str) -> Result<TaskStatus, ApiError> {
    serde_json::from_value(Value::String(raw.to_string()))
        .map_err(|_| schema_error("status must be one of todo, doing, done"))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.snapshot().await;
    Json(snapshot)
}

async fn list_items(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Vec<TaskEntity>>, ApiError> {
    let owner = state
        .resolver
        .resolve(&snapshot(&method, &headers, &query, None))?;
    let status = query.get("status").map(|s| parse_status(s)).transpose()?;
    let items = state.tasks.list(&owner, status).await?;
    Ok(Json(items))
}

async fn create_item(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<TaskEntity>), ApiError> {
    let owner = state
        .resolver
        .resolve(&snapshot(&method, &headers, &query, Some(&body)))?;
    let payload: CreateTaskPayload = decode_payload(strip_identity(body))?;
    let task = state.tasks.create(&owner, payload).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_item(
    State(state): State<AppState>,
    ItemId(id): ItemId<String>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<TaskEntity>, ApiError> {
    let owner = state
        .resolver
        .resolve(&snapshot(&method, &headers, &query, None))?;
    let task = state.tasks.get(&owner, &id).await?;
    Ok(Json(task))
}

async fn update_item(
    State(state): State<AppState>,
    ItemId(id): ItemId<String>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Result<Json<TaskEntity>, ApiError> {
    let owner = state
        .resolver
        .resolve(&snapshot(&method, &headers, &query, Some(&body)))?;
    let payload: UpdateTaskPayload = decode_payload(strip_identity(body))?;
    let task = state.tasks.update(&owner, &id, payload).await?;
    Ok(Json(task))
}

async fn delete_item(
    State(state): State<AppState>,
    ItemId(id): ItemId<String>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<StatusCode, ApiError> {
    let owner = state
        .resolver
        .resolve(&snapshot(&method, &headers, &query, None))?;
    state.tasks.delete(&owner, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChatPayload {
    message: String,
    #[serde(default)]
    conversation_history: Vec<ChatMessage>,
    #[serde(default)]
    session_id: Option<String>,
    /// Accepted for wire compatibility; the server derives its own count.
    #[serde(default)]
    #[allow(dead_code)]
    user_message_count: Option<u32>,
}

impl ChatPayload {
    fn into_turn(self) -> ChatTurn {
        ChatTurn {
            message: self.message,
            conversation_history: self.conversation_history,
            session_id: self.session_id,
        }
    }
}

async fn chat(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Result<Json<ChatReply>, ApiError> {
    let owner = state
        .resolver
        .resolve(&snapshot(&method, &headers, &query, Some(&body)))?;
    let payload: ChatPayload = decode_payload(strip_identity(body))?;
    let reply = state.chat.send(&owner, payload.into_turn()).await?;
    Ok(Json(reply))
}

async fn chat_health(State(state): State<AppState>) -> Response {
    match state.backend.health().await {
        Ok(()) => Json(json!({ "status": "ok", "backend": "reachable" })).into_response(),
        Err(err) => {
            tracing::warn!(code = err.0.code, "chat backend probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "backend": "unreachable" })),
            )
                .into_response()
        }
    }
}

async fn request_id_middleware(req: Request<Body>, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Id::new_random().0);
    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

async fn metrics_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    // Accumulate under the route pattern, not the raw path: per-id paths
    // would grow the route map without bound.
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| "(unmatched)".to_string());
    let start = Instant::now();
    let response = next.run(req).await;
    let status = response.status();
    if status.is_server_error() {
        tracing::warn!(%method, %path, status = status.as_u16(), "request errored");
    } else if status.is_client_error() {
        tracing::debug!(%method, %path, status = status.as_u16(), "request rejected");
    }
    state.metrics.record(&route, status, start.elapsed()).await;
    Ok(response)
}

#[derive(Clone, Default)]
struct GatewayMetrics {
    inner: Arc<tokio::sync::Mutex<MetricsInner>>,
}

#[derive(Default)]
struct MetricsInner {
    total_requests: u64,
    total_errors: u64,
    routes: HashMap<String, RouteStats>,
}

#[derive(Default)]
struct RouteStats {
    request_count: u64,
    error_count: u64,
    total_latency_ms: u64,
}

impl GatewayMetrics {
    async fn record(&self, route: &str, status: StatusCode, latency: Duration) {
        let mut inner = self.inner.lock().await;
        inner.total_requests += 1;
        if status.is_client_error() || status.is_server_error() {
            inner.total_errors += 1;
        }
        let stats = inner.routes.entry(route.to_string()).or_default();
        stats.request_count += 1;
        if status.is_client_error() || status.is_server_error() {
            stats.error_count += 1;
        }
        stats.total_latency_ms += latency.as_millis() as u64;
    }

    async fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock().await;
        let routes = inner
            .routes
            .iter()
            .map(|(route, stats)| RouteMetrics {
                route: route.clone(),
                requests: stats.request_count,
                errors: stats.error_count,
                avg_latency_ms: if stats.request_count > 0 {
                    Some(stats.total_latency_ms as f64 / stats.request_count as f64)
                } else {
                    None
                },
            })
            .collect();
        MetricsSnapshot {
            total_requests: inner.total_requests,
            total_errors: inner.total_errors,
            routes,
        }
    }
}

#[derive(Serialize)]
struct MetricsSnapshot {
    total_requests: u64,
    total_errors: u64,
    routes: Vec<RouteMetrics>,
}

#[derive(Serialize)]
struct RouteMetrics {
    route: String,
    requests: u64,
    errors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    avg_latency_ms: Option<f64>,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TaskService {
        let datastore = MemoryDatastore::new();
        TaskService::new(Arc::new(InMemoryRepository::<TaskEntity>::new(&datastore)))
    }

    fn owner() -> OwnerId {
        OwnerId("user-gw".into())
    }

    fn draft(title: &str) -> CreateTaskPayload {
        CreateTaskPayload {
            title: title.into(),
            details: "details".into(),
            status: TaskStatus::Todo,
        }
    }

    #[test]
    fn config_defaults_are_complete() {
        let config: GatewayConfig = serde_json::from_value(json!({})).expect("defaults");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.chat.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.chat.turn_cap, DEFAULT_TURN_CAP);
        assert!(config.auth.service_token.is_none());
    }

    #[test]
    fn app_state_wires_the_configured_turn_cap() {
        let config = GatewayConfig {
            chat: ChatBootstrap {
                turn_cap: 3,
                ..Default::default()
            },
            ..Default::default()
        };
        let state = AppState::new(&config).expect("state");
        assert_eq!(state.chat.limiter().cap(), 3);
    }

    #[test]
    fn unset_service_token_disables_the_channel() {
        let auth = AuthBootstrap::default();
        assert!(auth.resolve_service_token().expect("ok").is_none());

        let auth = AuthBootstrap {
            service_token: Some("literal-secret".into()),
            ..Default::default()
        };
        assert_eq!(
            auth.resolve_service_token().expect("ok").as_deref(),
            Some("literal-secret")
        );
    }

    #[test]
    fn empty_literal_secret_is_an_error() {
        let auth = AuthBootstrap {
            service_token: Some(String::new()),
            ..Default::default()
        };
        assert!(auth.resolve_service_token().is_err());
    }

    #[test]
    fn title_limits_are_char_based() {
        assert!(validate_title(&"x".repeat(200)).is_ok());
        assert!(validate_title(&"x".repeat(201)).is_err());
        assert!(validate_title("   ").is_err());
        // Multibyte characters count once each.
        assert!(validate_title(&"ü".repeat(200)).is_ok());
        assert!(validate_details(&"x".repeat(1001)).is_err());
    }

    #[test]
    fn strip_identity_removes_only_the_identity_field() {
        let body = json!({"user_id": "u-1", "title": "t"});
        assert_eq!(strip_identity(body), json!({"title": "t"}));
    }

    #[test]
    fn unknown_fields_fail_strict_decode() {
        let err = decode_payload::<CreateTaskPayload>(json!({
            "title": "t", "details": "d", "status": "todo", "priority": "high"
        }))
        .expect_err("unknown field");
        assert_eq!(err.0.code, "SCHEMA.VALIDATION");
    }

    #[test]
    fn parse_status_rejects_alien_values() {
        assert_eq!(parse_status("doing").expect("ok"), TaskStatus::Doing);
        assert!(parse_status("blocked").is_err());
    }

    #[test]
    fn snapshot_lowercases_header_names() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Service-Token", HeaderValue::from_static("secret"));
        let snap = snapshot(&Method::GET, &headers, &HashMap::new(), None);
        assert_eq!(snap.header("x-service-token"), Some("secret"));
    }

    #[tokio::test]
    async fn create_assigns_id_and_timestamp() {
        let service = service();
        let owner = owner();
        let task = service.create(&owner, draft("draft proposal")).await.expect("created");
        assert!(!task.id.is_empty());
        assert!(task.created_at_ms > 0);
        assert_eq!(task.owner, owner);

        let fetched = service.get(&owner, &task.id).await.expect("fetched");
        assert_eq!(fetched.title, "draft proposal");
    }

    #[tokio::test]
    async fn update_is_partial_and_validated() {
        let service = service();
        let owner = owner();
        let task = service.create(&owner, draft("initial")).await.unwrap();

        let updated = service
            .update(
                &owner,
                &task.id,
                UpdateTaskPayload {
                    status: Some(TaskStatus::Done),
                    ..Default::default()
                },
            )
            .await
            .expect("updated");
        assert_eq!(updated.status, TaskStatus::Done);
        assert_eq!(updated.title, "initial");
        assert_eq!(updated.created_at_ms, task.created_at_ms);

        let err = service
            .update(
                &owner,
                &task.id,
                UpdateTaskPayload {
                    title: Some("x".repeat(201)),
                    ..Default::default()
                },
            )
            .await
            .expect_err("oversized title");
        assert_eq!(err.0.code, "SCHEMA.VALIDATION");
    }

    #[tokio::test]
    async fn empty_update_still_404s_for_missing_ids() {
        let service = service();
        let err = service
            .update(&owner(), "no-such-task", UpdateTaskPayload::default())
            .await
            .expect_err("missing");
        assert_eq!(err.0.code, "STORAGE.NOT_FOUND");
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let service = service();
        let owner = owner();
        service.create(&owner, draft("a")).await.unwrap();
        let mut doing = draft("b");
        doing.status = TaskStatus::Doing;
        service.create(&owner, doing).await.unwrap();

        let all = service.list(&owner, None).await.unwrap();
        assert_eq!(all.len(), 2);
        let doing_only = service.list(&owner, Some(TaskStatus::Doing)).await.unwrap();
        assert_eq!(doing_only.len(), 1);
        assert_eq!(doing_only[0].title, "b");
    }

    #[tokio::test]
    async fn lifecycle_ends_in_not_found() {
        let service = service();
        let owner = owner();
        let task = service.create(&owner, draft("ephemeral")).await.unwrap();

        service.delete(&owner, &task.id).await.expect("deleted");
        let err = service.get(&owner, &task.id).await.expect_err("gone");
        assert_eq!(err.0.code, "STORAGE.NOT_FOUND");
        let err = service.delete(&owner, &task.id).await.expect_err("second delete");
        assert_eq!(err.0.code, "STORAGE.NOT_FOUND");
    }
}
