//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `ModelConnection` / `ModelConnector` - stateful model dialogues
//! - `QuestionBank` - candidate questions and the scoring rubric
//! - `ChatStore` - durable conversation snapshots

mod chat_store;
mod model_connection;
mod question_bank;

pub use chat_store::{ChatStore, ChatStoreError};
pub use model_connection::{ModelConnection, ModelConnector, ModelError, TokenStream};
pub use question_bank::{QuestionBank, QuestionBankError};
