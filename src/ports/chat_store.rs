//! Chat Store Port - Durable storage for conversation snapshots.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::conversation::ChatSnapshot;
use crate::domain::foundation::ChatId;

/// Errors that can occur during chat storage operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatStoreError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("chat store timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Port for persisting conversation snapshots.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Saves the full snapshot, replacing any previous one for the same chat.
    async fn save(&self, snapshot: &ChatSnapshot) -> Result<(), ChatStoreError>;

    /// Loads the last saved snapshot.
    ///
    /// Returns `Ok(None)` if the chat was never saved.
    async fn load(&self, chat_id: &ChatId) -> Result<Option<ChatSnapshot>, ChatStoreError>;
}
