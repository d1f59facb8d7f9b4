use crate::codes::ErrorCode;
use crate::retry::RetryClass;
use serde::Serialize;

/// The normalized error carried across crate boundaries. `user_msg` is the
/// only free-form text that may be rendered to a caller; `dev_msg` stays in
/// logs.
#[derive(Clone, Debug, Serialize)]
pub struct ErrorObj {
    pub code: &'static str,
    pub http_status: u16,
    pub retry: RetryClass,
    pub user_msg: String,
    #[serde(skip)]
    pub dev_msg: Option<String>,
}

impl ErrorObj {
    pub fn public_body(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.code,
            "message": self.user_msg,
        })
    }
}

impl std::fmt::Display for ErrorObj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.dev_msg {
            Some(dev) => write!(f, "{}: {}", self.code, dev),
            None => write!(f, "{}: {}", self.code, self.user_msg),
        }
    }
}

pub struct ErrorBuilder {
    code: ErrorCode,
    user_msg: Option<String>,
    dev_msg: Option<String>,
}

impl ErrorBuilder {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            user_msg: None,
            dev_msg: None,
        }
    }

    pub fn user_msg(mut self, msg: impl Into<String>) -> Self {
        self.user_msg = Some(msg.into());
        self
    }

    pub fn dev_msg(mut self, msg: impl Into<String>) -> Self {
        self.dev_msg = Some(msg.into());
        self
    }

    pub fn build(self) -> ErrorObj {
        ErrorObj {
            code: self.code.code,
            http_status: self.code.http_status,
            retry: self.code.retry,
            user_msg: self
                .user_msg
                .unwrap_or_else(|| "Request failed.".to_string()),
            dev_msg: self.dev_msg,
        }
    }
}
