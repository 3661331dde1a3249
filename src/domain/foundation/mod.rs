//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, validation errors and the state
//! machine trait that form the vocabulary of the intake domain.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::ValidationError;
pub use ids::{ChatId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
