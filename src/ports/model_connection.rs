//! Model Connection Port - Interface for stateful model dialogues.
//!
//! A connection is one ongoing dialogue with a generative model. It keeps its
//! own turn history, so callers only send the newest prompt. The connector
//! mints one connection per conversation; the session registry decides when.
//! A connection minted for a conversation that already has messages starts
//! from those messages, so a reopened session keeps its context.
//!
//! # Example
//!
//! ```ignore
//! let connection = connector.connect(&chat_id, state.messages());
//! let mut tokens = connection.send_message("Chiedimi nome e data di nascita").await?;
//! while let Some(token) = tokens.next().await {
//!     print!("{}", token?);
//! }
//! ```

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::conversation::Message;
use crate::domain::foundation::ChatId;

/// Incremental text tokens of one model reply.
///
/// The stream ends after the last token. An `Err` item ends the reply early.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, ModelError>> + Send>>;

/// One live dialogue with a model.
#[async_trait]
pub trait ModelConnection: Send + Sync {
    /// Sends `prompt` as the next user turn and streams the reply.
    ///
    /// The reply enters the connection's history only once the returned
    /// stream has been drained without error.
    async fn send_message(&self, prompt: &str) -> Result<TokenStream, ModelError>;

    /// Identifier of the backing model, for logging.
    fn model_name(&self) -> &str;
}

/// Factory for model connections.
///
/// `connect` must not perform I/O. It runs while the session registry holds
/// its map lock.
pub trait ModelConnector: Send + Sync {
    /// Opens a dialogue whose history starts from `history`.
    ///
    /// User and assistant messages become prior turns; other roles are not
    /// part of the model dialogue and are skipped.
    fn connect(&self, chat_id: &ChatId, history: &[Message]) -> Arc<dyn ModelConnection>;
}

/// Model call errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Provider is unavailable.
    #[error("model unavailable: {message}")]
    Unavailable { message: String },

    /// Rate limited by provider.
    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u32 },

    /// API key rejected.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Network error during request.
    #[error("network error: {0}")]
    Network(String),

    /// Failed to parse provider response.
    #[error("parse error: {0}")]
    Parse(String),

    /// The model finished without producing any text.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// No terminal event within the deadline.
    #[error("model call timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

impl ModelError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ModelError::RateLimited { .. }
                | ModelError::Unavailable { .. }
                | ModelError::Network(_)
                | ModelError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(ModelError::RateLimited { retry_after_secs: 5 }.is_retryable());
        assert!(ModelError::network("reset").is_retryable());
        assert!(ModelError::Timeout {
            timeout: Duration::from_secs(1)
        }
        .is_retryable());
        assert!(!ModelError::AuthenticationFailed.is_retryable());
        assert!(!ModelError::EmptyResponse.is_retryable());
        assert!(!ModelError::parse("bad json").is_retryable());
    }

    #[test]
    fn error_messages_carry_details() {
        assert_eq!(
            ModelError::unavailable("503").to_string(),
            "model unavailable: 503"
        );
        assert_eq!(
            ModelError::Timeout {
                timeout: Duration::from_secs(120)
            }
            .to_string(),
            "model call timed out after 120s"
        );
        assert_eq!(
            ModelError::Timeout {
                timeout: Duration::from_millis(250)
            }
            .to_string(),
            "model call timed out after 250ms"
        );
    }
}
