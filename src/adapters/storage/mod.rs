//! Storage Adapters
//!
//! Implementations of the ChatStore port for persisting chat snapshots.
//!
//! ## Available Adapters
//!
//! - **FileChatStore** - Stores snapshots as YAML files on disk
//! - **InMemoryChatStore** - Stores snapshots in memory (testing/development)
//!
//! ## Usage
//!
//! ```ignore
//! use adapters::storage::{FileChatStore, InMemoryChatStore};
//!
//! // Production: file-based storage
//! let store = FileChatStore::new("./data/chats");
//!
//! // Testing: in-memory storage
//! let store = InMemoryChatStore::new();
//! ```

mod file_chat_store;
mod in_memory_chat_store;

pub use file_chat_store::FileChatStore;
pub use in_memory_chat_store::InMemoryChatStore;
