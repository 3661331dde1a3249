//! Chat storage configuration

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one YAML file per chat
    #[serde(default = "default_chats_dir")]
    pub chats_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            chats_dir: default_chats_dir(),
        }
    }
}

fn default_chats_dir() -> PathBuf {
    PathBuf::from("data/chats")
}
