//! HTTP adapter for chat endpoints.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::{ChatView, ErrorResponse, MessageView, SendMessageRequest, SendMessageResponse};
pub use handlers::{ChatApiError, ChatAppState};
pub use routes::{chat_router, chat_routes};
