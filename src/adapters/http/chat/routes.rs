//! Axum routes for chat endpoints.

use axum::routing::{delete, get, post};
use axum::Router;

use super::handlers::{
    chat_events, close_session, get_chat, persist_chat, send_message, ChatAppState,
};

/// Creates routes for chat endpoints.
///
/// - POST /chats/:chat_id/messages - Run one turn
/// - GET /chats/:chat_id - Chat history
/// - GET /chats/:chat_id/events - SSE token and commit events
/// - POST /chats/:chat_id/persist - Retry a failed save
/// - DELETE /chats/:chat_id/session - Close the model session
pub fn chat_routes() -> Router<ChatAppState> {
    Router::new()
        .route("/chats/:chat_id", get(get_chat))
        .route("/chats/:chat_id/messages", post(send_message))
        .route("/chats/:chat_id/events", get(chat_events))
        .route("/chats/:chat_id/persist", post(persist_chat))
        .route("/chats/:chat_id/session", delete(close_session))
}

/// Chat routes nested under /api, with state applied.
pub fn chat_router(state: ChatAppState) -> Router {
    Router::new().nest("/api", chat_routes()).with_state(state)
}
