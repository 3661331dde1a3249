//! File-based Chat Store Adapter
//!
//! Stores each conversation snapshot as one YAML file named after its chat id.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::domain::conversation::ChatSnapshot;
use crate::domain::foundation::ChatId;
use crate::ports::{ChatStore, ChatStoreError};

/// File-based storage for chat snapshots
#[derive(Debug, Clone)]
pub struct FileChatStore {
    base_path: PathBuf,
}

impl FileChatStore {
    /// Create a new file store with a base directory
    ///
    /// # Example
    /// ```ignore
    /// let store = FileChatStore::new("./data/chats");
    /// ```
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Chat ids only contain `[A-Za-z0-9_-]`, so they are safe file names.
    fn chat_file_path(&self, chat_id: &ChatId) -> PathBuf {
        self.base_path.join(format!("{chat_id}.yaml"))
    }

    fn temp_file_path(&self, chat_id: &ChatId) -> PathBuf {
        self.base_path.join(format!(".{chat_id}.yaml.tmp"))
    }
}

#[async_trait]
impl ChatStore for FileChatStore {
    async fn save(&self, snapshot: &ChatSnapshot) -> Result<(), ChatStoreError> {
        fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| ChatStoreError::Io(e.to_string()))?;

        let yaml = serde_yaml::to_string(snapshot)
            .map_err(|e| ChatStoreError::Serialization(e.to_string()))?;

        // Write then rename so readers never observe a half-written file.
        let tmp = self.temp_file_path(&snapshot.id);
        fs::write(&tmp, yaml)
            .await
            .map_err(|e| ChatStoreError::Io(e.to_string()))?;
        fs::rename(&tmp, self.chat_file_path(&snapshot.id))
            .await
            .map_err(|e| ChatStoreError::Io(e.to_string()))?;

        Ok(())
    }

    async fn load(&self, chat_id: &ChatId) -> Result<Option<ChatSnapshot>, ChatStoreError> {
        let yaml = match fs::read_to_string(self.chat_file_path(chat_id)).await {
            Ok(yaml) => yaml,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ChatStoreError::Io(e.to_string())),
        };

        serde_yaml::from_str(&yaml)
            .map(Some)
            .map_err(|e| ChatStoreError::Serialization(e.to_string()))
    }
}
