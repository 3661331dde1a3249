//! Persistable view of a conversation.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ChatId, Timestamp, UserId};

use super::Message;

/// Number of leading characters of the first message used as chat title.
pub const TITLE_MAX_CHARS: usize = 100;

/// The record handed to the chat store after every committed turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSnapshot {
    pub id: ChatId,
    pub title: String,
    pub owner_id: UserId,
    pub created_at: Timestamp,
    pub messages: Vec<Message>,
    pub path: String,
}

impl ChatSnapshot {
    /// Route under which the UI serves a chat.
    pub fn path_for(chat_id: &ChatId) -> String {
        format!("/chat/{chat_id}")
    }

    /// Title derived from the first message's leading characters.
    ///
    /// Counts characters, not bytes, so accented patient names are never
    /// split mid-codepoint.
    pub fn title_from(messages: &[Message]) -> String {
        messages
            .first()
            .map(|m| m.content().chars().take(TITLE_MAX_CHARS).collect())
            .unwrap_or_default()
    }
}
