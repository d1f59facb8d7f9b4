use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::time::sleep;

/// In-test stand-in for the external chat backend. Echoes the message back,
/// mirrors the session id, and attaches a canned tool-usage payload so the
/// normalizer path is exercised end to end.
pub struct StubBackend {
    pub base_url: String,
    chat_calls: Arc<AtomicUsize>,
}

impl StubBackend {
    pub async fn spawn() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub backend");
        let addr = listener.local_addr().expect("stub backend addr");
        let chat_calls = Arc::new(AtomicUsize::new(0));

        let app = Router::new()
            .route("/chat", post(stub_chat))
            .route("/health", get(stub_health))
            .with_state(chat_calls.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            chat_calls,
        }
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }
}

async fn stub_chat(State(calls): State<Arc<AtomicUsize>>, Json(body): Json<Value>) -> Json<Value> {
    calls.fetch_add(1, Ordering::SeqCst);
    let message = body["message"].as_str().unwrap_or_default();
    Json(json!({
        "response": format!("echo: {message}"),
        "session_id": body["session_id"],
        "tool_usage": {
            "has_tools": true,
            "tool_calls": [{
                "function": { "name": "list_tasks", "arguments": "{}" },
                "content": [{ "type": "text", "text": "stub result" }]
            }]
        }
    }))
}

async fn stub_health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub struct GatewayProcess {
    child: Child,
    pub base_url: String,
    pub service_token: String,
    pub backend: StubBackend,
    _dir: TempDir,
}

impl GatewayProcess {
    pub async fn spawn() -> Self {
        let backend = StubBackend::spawn().await;
        let chat_base_url = backend.base_url.clone();
        Self::spawn_against(backend, chat_base_url).await
    }

    /// Gateway wired to a port nobody listens on, for the degraded paths.
    /// The stub still exists so call-count assertions stay available.
    pub async fn spawn_with_unreachable_backend() -> Self {
        let backend = StubBackend::spawn().await;
        let dead_port = free_port();
        Self::spawn_against(backend, format!("http://127.0.0.1:{dead_port}")).await
    }

    async fn spawn_against(backend: StubBackend, chat_base_url: String) -> Self {
        let port = free_port();
        let tmp_dir = TempDir::new().expect("temp dir");
        let service_token = format!("contract-token-{port}");
        let config = format!(
            r#"
[server]
address = "127.0.0.1"
port = 0

[auth]
service_token_env = "BOARDBASE_SERVICE_TOKEN_LOCAL"

[chat]
base_url = "{chat_base_url}"
request_timeout_ms = 5000
turn_cap = 5
"#
        );
        let config_path = write_config(tmp_dir.path(), &config);

        let mut child = Command::new(env!("CARGO_BIN_EXE_boardbase-gateway"))
            .env("BOARDBASE_CONFIG_FILE", &config_path)
            .env("BOARDBASE_SERVICE_TOKEN_LOCAL", &service_token)
            .env("BOARDBASE__SERVER__ADDRESS", "127.0.0.1")
            .env("BOARDBASE__SERVER__PORT", port.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn gateway process");

        let base_url = format!("http://127.0.0.1:{port}");
        wait_for_ready(&base_url, &mut child).await;

        Self {
            child,
            base_url,
            service_token,
            backend,
            _dir: tmp_dir,
        }
    }
}

impl Drop for GatewayProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn client() -> Client {
    Client::new()
}

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test port");
    let port = listener.local_addr().expect("port").port();
    drop(listener);
    port
}

fn write_config(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("boardbase.toml");
    std::fs::write(&path, contents).expect("write config");
    path
}

async fn wait_for_ready(base_url: &str, child: &mut Child) {
    let client = Client::new();
    for _ in 0..100 {
        if let Some(status) = child.try_wait().expect("check gateway child status") {
            panic!("gateway process exited early with status {status}");
        }
        if let Ok(resp) = client.get(format!("{base_url}/health")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        sleep(Duration::from_millis(100)).await;
    }
    panic!("gateway did not become ready at {base_url}");
}
