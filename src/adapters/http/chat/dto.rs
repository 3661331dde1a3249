//! Request and response bodies for the chat endpoints.

use serde::{Deserialize, Serialize};

use crate::application::TurnReceipt;
use crate::domain::conversation::{
    ui_messages, ChatSnapshot, InterviewPhase, Message, MessageKind, Role, UiMessage,
};
use crate::domain::foundation::{ChatId, Timestamp, UserId};

/// Body of `POST /api/chats/:chat_id/messages`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Patient text. May be empty on the opening turn.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub kind: MessageKind,
    pub user_id: String,
}

/// Result of a committed turn.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub id: String,
    pub reply: String,
    pub phase: InterviewPhase,
    /// True when the model failed and the fallback reply was committed.
    pub fallback: bool,
    /// False when the turn committed but the store rejected it.
    pub persisted: bool,
}

impl SendMessageResponse {
    pub fn from_receipt(receipt: TurnReceipt, persisted: bool) -> Self {
        Self {
            id: receipt.id.to_string(),
            reply: receipt.reply,
            phase: receipt.phase,
            fallback: receipt.fallback,
            persisted,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: Timestamp,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id().to_string(),
            role: message.role(),
            content: message.content().to_string(),
            created_at: *message.created_at(),
        }
    }
}

/// Body of `GET /api/chats/:chat_id`.
///
/// `messages` is the full log; `ui_messages` is what the patient sees.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    pub id: ChatId,
    pub title: String,
    pub owner_id: UserId,
    pub created_at: Timestamp,
    pub path: String,
    pub messages: Vec<MessageView>,
    pub ui_messages: Vec<UiMessage>,
}

impl From<ChatSnapshot> for ChatView {
    fn from(snapshot: ChatSnapshot) -> Self {
        Self {
            ui_messages: ui_messages(&snapshot.id, &snapshot.messages),
            messages: snapshot.messages.iter().map(MessageView::from).collect(),
            id: snapshot.id,
            title: snapshot.title,
            owner_id: snapshot.owner_id,
            created_at: snapshot.created_at,
            path: snapshot.path,
        }
    }
}

/// Error body shared by all chat endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn not_found(resource_type: &str, id: &str) -> Self {
        Self::new("NOT_FOUND", format!("{} not found: {}", resource_type, id))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}
