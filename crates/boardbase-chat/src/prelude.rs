pub use crate::backend::{
    BackendChatRequest, BackendChatResponse, ChatBackend, ChatBackendConfig, HttpChatBackend,
    DEFAULT_BASE_URL,
};
pub use crate::errors::ChatError;
pub use crate::limit::{TurnLimiter, TurnVerdict, DEFAULT_TURN_CAP};
pub use crate::model::{ChatMessage, Role};
pub use crate::proxy::{ChatProxy, ChatReply, ChatTurn};
pub use crate::tool_usage::{ToolCallView, ToolUsage};
