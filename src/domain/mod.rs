//! Domain layer - pure conversation and intake logic.
//!
//! Nothing in here performs I/O. Ports and adapters supply the model,
//! the question bank and chat storage.

pub mod conversation;
pub mod foundation;
pub mod intake;
