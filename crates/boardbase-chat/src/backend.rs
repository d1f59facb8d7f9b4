use crate::errors::ChatError;
use crate::model::ChatMessage;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8085";
const CHAT_PATH: &str = "chat";
const HEALTH_PATH: &str = "health";

#[derive(Clone, Debug, Serialize)]
pub struct BackendChatRequest {
    pub message: String,
    pub conversation_history: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BackendChatResponse {
    pub response: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub tool_usage: Option<Value>,
}

/// The external chat service boundary. The proxy only ever issues a single
/// attempt per request; retry policy belongs to callers.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send(&self, request: BackendChatRequest) -> Result<BackendChatResponse, ChatError>;
    async fn health(&self) -> Result<(), ChatError>;
}

/// Connection settings for the HTTP chat backend. The base URL is an explicit
/// injected value; business logic never falls back to ambient environment
/// state.
#[derive(Clone, Debug)]
pub struct ChatBackendConfig {
    pub base_url: Url,
    pub request_timeout: Duration,
}

impl ChatBackendConfig {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, ChatError> {
        let mut base_url = Url::parse(base_url.as_ref())
            .map_err(|err| ChatError::unknown(&format!("backend base url parse failed: {err}")))?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path().trim_end_matches('/')));
        }
        Ok(Self {
            base_url,
            request_timeout: Duration::from_secs(30),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

pub struct HttpChatBackend {
    client: Client,
    chat_url: Url,
    health_url: Url,
}

impl HttpChatBackend {
    pub fn new(config: ChatBackendConfig) -> Result<Self, ChatError> {
        let client = Client::builder()
            // A hung backend must not pin a request slot indefinitely.
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| ChatError::unknown(&format!("backend client build failed: {err}")))?;
        let chat_url = config
            .base_url
            .join(CHAT_PATH)
            .map_err(|err| ChatError::unknown(&format!("chat url join failed: {err}")))?;
        let health_url = config
            .base_url
            .join(HEALTH_PATH)
            .map_err(|err| ChatError::unknown(&format!("health url join failed: {err}")))?;
        Ok(Self {
            client,
            chat_url,
            health_url,
        })
    }

    fn map_status(status: StatusCode) -> ChatError {
        ChatError::provider_unavailable(&format!("backend returned status {status}"))
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn send(&self, request: BackendChatRequest) -> Result<BackendChatResponse, ChatError> {
        let response = self
            .client
            .post(self.chat_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|err| ChatError::provider_unavailable(&format!("backend request: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::map_status(status));
        }

        response
            .json::<BackendChatResponse>()
            .await
            .map_err(|err| ChatError::provider_unavailable(&format!("backend decode: {err}")))
    }

    async fn health(&self) -> Result<(), ChatError> {
        let response = self
            .client
            .get(self.health_url.clone())
            .send()
            .await
            .map_err(|err| ChatError::provider_unavailable(&format!("backend health: {err}")))?;
        if !response.status().is_success() {
            return Err(Self::map_status(response.status()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_normalizes_trailing_slash() {
        let config = ChatBackendConfig::new("http://localhost:8085").unwrap();
        assert_eq!(config.base_url.as_str(), "http://localhost:8085/");

        let nested = ChatBackendConfig::new("http://host:1/api/v2").unwrap();
        let backend = HttpChatBackend::new(nested).unwrap();
        assert_eq!(backend.chat_url.as_str(), "http://host:1/api/v2/chat");
        assert_eq!(backend.health_url.as_str(), "http://host:1/api/v2/health");
    }

    #[test]
    fn config_rejects_garbage_urls() {
        assert!(ChatBackendConfig::new("not a url").is_err());
    }
}
