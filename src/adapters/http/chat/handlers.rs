//! HTTP handlers for chat endpoints.
//!
//! These handlers connect Axum routes to the intake orchestrator.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::stream::Stream;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::application::{IntakeOrchestrator, SubmitUserMessage, TurnError, TurnEvent};
use crate::domain::foundation::{ChatId, UserId};

use super::dto::{ChatView, ErrorResponse, SendMessageRequest, SendMessageResponse};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state for chat handlers.
#[derive(Clone)]
pub struct ChatAppState {
    pub orchestrator: Arc<IntakeOrchestrator>,
}

impl ChatAppState {
    pub fn new(orchestrator: Arc<IntakeOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// POST /api/chats/:chat_id/messages
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/chats/:chat_id/messages - Submit patient input and run one turn.
///
/// Responds once the assistant reply is committed. Tokens are delivered to
/// `/events` subscribers while the turn runs.
///
/// The turn runs on its own task, so a client that disconnects mid-reply
/// does not abort it; the reply is still committed and persisted.
///
/// # Errors
/// - 400 Bad Request: Invalid chat or user id
/// - 503 Service Unavailable: Rubric, question bank or stored history
///   unavailable; or the reply committed but was not persisted (the reply is
///   in `details`)
pub async fn send_message(
    State(state): State<ChatAppState>,
    Path(chat_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ChatApiError> {
    let chat_id = parse_chat_id(chat_id)?;
    let owner = UserId::new(request.user_id)
        .map_err(|e| ChatApiError::BadRequest(e.to_string()))?;

    let mut cmd = SubmitUserMessage::new(chat_id, owner, request.content);
    cmd.kind = request.kind;

    let orchestrator = Arc::clone(&state.orchestrator);
    let receipt = tokio::spawn(async move { orchestrator.submit_user_message(cmd).await })
        .await
        .map_err(|e| ChatApiError::Internal(format!("turn task failed: {e}")))??;
    Ok((
        StatusCode::OK,
        Json(SendMessageResponse::from_receipt(receipt, true)),
    ))
}

// ════════════════════════════════════════════════════════════════════════════════
// GET /api/chats/:chat_id
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/chats/:chat_id - Full history plus the patient-facing rows.
///
/// # Errors
/// - 404 Not Found: No such chat
pub async fn get_chat(
    State(state): State<ChatAppState>,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, ChatApiError> {
    let chat_id = parse_chat_id(chat_id)?;

    let snapshot = state
        .orchestrator
        .conversation(&chat_id)
        .await
        .map_err(|e| ChatApiError::Internal(e.to_string()))?
        .ok_or_else(|| ChatApiError::NotFound("Chat".to_string(), chat_id.to_string()))?;

    Ok((StatusCode::OK, Json(ChatView::from(snapshot))))
}

// ════════════════════════════════════════════════════════════════════════════════
// POST /api/chats/:chat_id/persist
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/chats/:chat_id/persist - Retry saving a chat after a
/// persistence failure.
pub async fn persist_chat(
    State(state): State<ChatAppState>,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, ChatApiError> {
    let chat_id = parse_chat_id(chat_id)?;
    state
        .orchestrator
        .persist(&chat_id)
        .await
        .map_err(|e| ChatApiError::Unavailable("PERSISTENCE_FAILED", e.to_string(), None))?;
    Ok(StatusCode::NO_CONTENT)
}

// ════════════════════════════════════════════════════════════════════════════════
// DELETE /api/chats/:chat_id/session
// ════════════════════════════════════════════════════════════════════════════════

/// DELETE /api/chats/:chat_id/session - End the chat's model dialogue.
///
/// History is kept; the next turn opens a fresh session.
pub async fn close_session(
    State(state): State<ChatAppState>,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, ChatApiError> {
    let chat_id = parse_chat_id(chat_id)?;
    if state.orchestrator.close_session(&chat_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ChatApiError::NotFound(
            "Session".to_string(),
            chat_id.to_string(),
        ))
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// GET /api/chats/:chat_id/events
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/chats/:chat_id/events - Server-sent token and commit events.
pub async fn chat_events(
    State(state): State<ChatAppState>,
    Path(chat_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ChatApiError> {
    let chat_id = parse_chat_id(chat_id)?;
    let rx = state.orchestrator.subscribe(&chat_id);

    let events = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(turn_event_to_sse(&event))),
        // Lagged subscribers skip ahead.
        Err(_) => None,
    });

    Ok(Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}

fn turn_event_to_sse(event: &TurnEvent) -> Event {
    let name = match event {
        TurnEvent::Token { .. } => "token",
        TurnEvent::Committed { .. } => "committed",
        TurnEvent::Failed { .. } => "failed",
    };
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    Event::default().event(name).data(data)
}

fn parse_chat_id(raw: String) -> Result<ChatId, ChatApiError> {
    ChatId::new(raw).map_err(|e| ChatApiError::BadRequest(e.to_string()))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type for chat endpoints.
#[derive(Debug)]
pub enum ChatApiError {
    BadRequest(String),
    NotFound(String, String),
    Unavailable(&'static str, String, Option<serde_json::Value>),
    Internal(String),
}

impl From<TurnError> for ChatApiError {
    fn from(err: TurnError) -> Self {
        match err {
            TurnError::RubricMissing(_) => {
                ChatApiError::Unavailable("RUBRIC_MISSING", err.to_string(), None)
            }
            TurnError::QuestionBankUnavailable(_) => {
                ChatApiError::Unavailable("QUESTION_BANK_UNAVAILABLE", err.to_string(), None)
            }
            TurnError::HistoryUnavailable(_) => {
                ChatApiError::Unavailable("HISTORY_UNAVAILABLE", err.to_string(), None)
            }
            TurnError::PersistenceFailed { receipt, reason } => {
                let committed = SendMessageResponse::from_receipt(receipt, false);
                ChatApiError::Unavailable(
                    "PERSISTENCE_FAILED",
                    format!("reply committed but not saved: {reason}"),
                    serde_json::to_value(committed).ok(),
                )
            }
            TurnError::InvalidTransition(msg) => ChatApiError::Internal(msg),
        }
    }
}

impl IntoResponse for ChatApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ChatApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorResponse::bad_request(msg))
            }
            ChatApiError::NotFound(resource, id) => {
                (StatusCode::NOT_FOUND, ErrorResponse::not_found(&resource, &id))
            }
            ChatApiError::Unavailable(code, msg, details) => {
                tracing::warn!(code, "Service unavailable: {}", msg);
                let mut error = ErrorResponse::new(code, msg);
                if let Some(details) = details {
                    error = error.with_details(details);
                }
                (StatusCode::SERVICE_UNAVAILABLE, error)
            }
            ChatApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::internal("An internal error occurred"),
                )
            }
        };

        (status, Json(error)).into_response()
    }
}
