//! In-Memory Chat Store Adapter
//!
//! Stores chat snapshots in memory. Useful for testing and development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::conversation::ChatSnapshot;
use crate::domain::foundation::ChatId;
use crate::ports::{ChatStore, ChatStoreError};

/// In-memory storage for chat snapshots
#[derive(Debug, Clone, Default)]
pub struct InMemoryChatStore {
    chats: Arc<RwLock<HashMap<ChatId, ChatSnapshot>>>,
    saves: Arc<AtomicUsize>,
    fail_saves: Arc<AtomicBool>,
    save_delay: Duration,
}

impl InMemoryChatStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every save, for timeout tests.
    pub fn with_save_delay(mut self, delay: Duration) -> Self {
        self.save_delay = delay;
        self
    }

    /// Makes subsequent saves fail with an IO error until switched off.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Number of stored chats.
    pub async fn chat_count(&self) -> usize {
        self.chats.read().await.len()
    }

    /// Seeds a snapshot without counting it as a save.
    pub async fn insert(&self, snapshot: ChatSnapshot) {
        self.chats.write().await.insert(snapshot.id.clone(), snapshot);
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn save(&self, snapshot: &ChatSnapshot) -> Result<(), ChatStoreError> {
        if !self.save_delay.is_zero() {
            tokio::time::sleep(self.save_delay).await;
        }
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(ChatStoreError::Io("store rejected the save".to_string()));
        }
        self.chats
            .write()
            .await
            .insert(snapshot.id.clone(), snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self, chat_id: &ChatId) -> Result<Option<ChatSnapshot>, ChatStoreError> {
        Ok(self.chats.read().await.get(chat_id).cloned())
    }
}
