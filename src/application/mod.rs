//! Application layer - turn orchestration.
//!
//! Coordinates the domain with the model, question bank and chat store
//! ports. [`IntakeOrchestrator`] is the single entry point used by the HTTP
//! adapter.

mod conversations;
mod events;
mod orchestrator;
mod session_registry;
mod streamer;

pub use conversations::{ConversationSlot, ConversationSlots, SharedSlot};
pub use events::{TurnEvent, TurnEventHub};
pub use orchestrator::{
    EvictionReport, IntakeOrchestrator, OrchestratorConfig, SubmitUserMessage, TurnError,
    TurnReceipt, DEFAULT_FALLBACK_REPLY, TURN_INTERRUPTED,
};
pub use session_registry::{Session, SessionRegistry};
pub use streamer::{ResponseStream, ResponseStreamer, StreamEvent};
