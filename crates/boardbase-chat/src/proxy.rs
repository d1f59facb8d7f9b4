use crate::backend::{BackendChatRequest, ChatBackend};
use crate::errors::ChatError;
use crate::limit::{TurnLimiter, TurnVerdict};
use crate::model::{ChatMessage, Role};
use crate::tool_usage::{self, ToolUsage};
use boardbase_types::prelude::{Id, OwnerId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Debug, Deserialize)]
pub struct ChatTurn {
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<ChatMessage>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub session_id: String,
    pub user_message_count: u32,
    pub tool_usage: ToolUsage,
}

/// Stateless per-request chat proxy. Session continuity is rebuilt from the
/// caller-supplied history on every call; the only state the proxy hands back
/// is the session id, minted here on the first turn and echoed thereafter.
pub struct ChatProxy {
    backend: Arc<dyn ChatBackend>,
    limiter: TurnLimiter,
}

impl ChatProxy {
    pub fn new(backend: Arc<dyn ChatBackend>, limiter: TurnLimiter) -> Self {
        Self { backend, limiter }
    }

    pub fn limiter(&self) -> &TurnLimiter {
        &self.limiter
    }

    pub async fn send(&self, owner: &OwnerId, turn: ChatTurn) -> Result<ChatReply, ChatError> {
        if turn.message.trim().is_empty() {
            return Err(ChatError::schema("message missing"));
        }

        let session_id = turn
            .session_id
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| Id::new_random().0);

        // Current message plus user-authored history entries. Counted here,
        // never taken from the client.
        let user_message_count = 1 + turn
            .conversation_history
            .iter()
            .filter(|msg| msg.role == Role::User)
            .count() as u32;

        if self.limiter.check(user_message_count) == TurnVerdict::LimitReached {
            tracing::debug!(turns = user_message_count, "turn cap reached, answering locally");
            return Ok(ChatReply {
                response: self.limiter.limit_message(),
                session_id,
                user_message_count,
                tool_usage: ToolUsage::none(),
            });
        }

        // The identity preamble is injected fresh on every call so the
        // backend can attribute tool calls to the right owner. It is part of
        // the forwarded history only and never persisted for the caller.
        let mut forwarded = Vec::with_capacity(turn.conversation_history.len() + 1);
        forwarded.push(ChatMessage::system(format!(
            "User ID: {}. Use this user ID when calling task board tools.",
            owner
        )));
        forwarded.extend(turn.conversation_history.iter().cloned());

        let backend_response = self
            .backend
            .send(BackendChatRequest {
                message: turn.message.clone(),
                conversation_history: forwarded,
                session_id: Some(session_id.clone()),
            })
            .await?;

        let session_id = backend_response
            .session_id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(session_id);

        Ok(ChatReply {
            response: backend_response.response,
            session_id,
            user_message_count,
            tool_usage: tool_usage::normalize(backend_response.tool_usage.as_ref()),
        })
    }
}
