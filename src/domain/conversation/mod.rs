//! Conversation domain module.
//!
//! Holds the message log of an intake conversation, the turn lifecycle and
//! the rules that derive the interview phase.

mod message;
mod phase;
mod snapshot;
mod state;
mod turn;
mod ui;

pub use message::{Message, MessageId, Role};
pub use phase::{InterviewPhase, MessageKind, TriggerPolicy, DEFAULT_TRIGGER_PHRASE};
pub use snapshot::{ChatSnapshot, TITLE_MAX_CHARS};
pub use state::ConversationState;
pub use turn::TurnState;
pub use ui::{ui_messages, UiMessage};
