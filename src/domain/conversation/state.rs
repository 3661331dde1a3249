//! Conversation state: the append-only message log of one intake.

use crate::domain::foundation::{ChatId, Timestamp, UserId};

use super::{ChatSnapshot, Message, Role};

/// Ordered, append-only message log for one conversation.
///
/// # Invariants
///
/// - messages are never reordered or removed
/// - `append` is the only mutation
/// - `owner` and `created_at` are fixed when the conversation is created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationState {
    chat_id: ChatId,
    owner: UserId,
    created_at: Timestamp,
    messages: Vec<Message>,
}

impl ConversationState {
    /// Starts an empty conversation.
    pub fn new(chat_id: ChatId, owner: UserId) -> Self {
        Self {
            chat_id,
            owner,
            created_at: Timestamp::now(),
            messages: Vec::new(),
        }
    }

    /// Rebuilds a conversation from a persisted snapshot.
    pub fn from_snapshot(snapshot: ChatSnapshot) -> Self {
        Self {
            chat_id: snapshot.id,
            owner: snapshot.owner_id,
            created_at: snapshot.created_at,
            messages: snapshot.messages,
        }
    }

    /// Appends a message to the end of the log.
    pub fn append(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    /// Number of assistant messages; the sole phase discriminator.
    pub fn assistant_message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_assistant()).count()
    }

    /// Everything the assistant has said so far, oldest first.
    pub fn asked_questions(&self) -> impl Iterator<Item = &str> {
        self.messages
            .iter()
            .filter(|m| m.role() == Role::Assistant)
            .map(Message::content)
    }

    /// Immutable view for persistence.
    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            id: self.chat_id.clone(),
            title: ChatSnapshot::title_from(&self.messages),
            owner_id: self.owner.clone(),
            created_at: self.created_at,
            messages: self.messages.clone(),
            path: ChatSnapshot::path_for(&self.chat_id),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn chat_id(&self) -> &ChatId {
        &self.chat_id
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
