//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `ai` - Gemini model connections and a scripted mock
//! - `bank` - Transcript and rubric files
//! - `http` - Axum REST and SSE endpoints
//! - `storage` - Chat snapshot persistence (YAML files, in-memory)

pub mod ai;
pub mod bank;
pub mod http;
pub mod storage;
