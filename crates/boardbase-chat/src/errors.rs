use boardbase_errors::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0:?}")]
pub struct ChatError(pub Box<ErrorObj>);

impl ChatError {
    pub fn into_inner(self) -> ErrorObj {
        *self.0
    }

    pub fn schema(msg: &str) -> Self {
        ChatError(Box::new(
            ErrorBuilder::new(codes::SCHEMA_VALIDATION)
                .user_msg("Chat request failed validation.")
                .dev_msg(msg)
                .build(),
        ))
    }

    pub fn provider_unavailable(msg: &str) -> Self {
        ChatError(Box::new(
            ErrorBuilder::new(codes::PROVIDER_UNAVAILABLE)
                .user_msg("The chat service is unavailable right now.")
                .dev_msg(msg)
                .build(),
        ))
    }

    pub fn unknown(msg: &str) -> Self {
        ChatError(Box::new(
            ErrorBuilder::new(codes::UNKNOWN_INTERNAL)
                .user_msg("Chat turn failed.")
                .dev_msg(msg)
                .build(),
        ))
    }
}
