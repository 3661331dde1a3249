//! Projection of a chat into transcript rows for the UI layer.

use serde::Serialize;

use crate::domain::foundation::ChatId;

use super::{Message, Role};

/// One rendered transcript row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UiMessage {
    /// `{chat_id}-{index}`, stable across reloads.
    pub id: String,
    pub role: Role,
    pub content: String,
}

/// Hides system messages and numbers the remaining rows.
///
/// The index counts visible rows only.
pub fn ui_messages(chat_id: &ChatId, messages: &[Message]) -> Vec<UiMessage> {
    messages
        .iter()
        .filter(|m| m.role().is_user_visible())
        .enumerate()
        .map(|(index, m)| UiMessage {
            id: format!("{chat_id}-{index}"),
            role: m.role(),
            content: m.content().to_string(),
        })
        .collect()
}
