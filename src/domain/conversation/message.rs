//! Message entity for conversations.
//!
//! Messages are immutable records of the exchanges within one intake
//! conversation. Each message has a role, content, and timestamp.

use crate::domain::foundation::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a message within a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Creates a new random MessageId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a MessageId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Patient input.
    User,
    /// Model reply.
    Assistant,
    /// System instructions (never shown to the patient).
    System,
    /// Structured side-channel payloads.
    Data,
}

impl Role {
    /// Returns true if this role is rendered in the chat transcript.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::System)
    }
}

/// An immutable message within a conversation.
///
/// Content is stored verbatim; an empty user message is legal (the very
/// first turn of an intake may carry no text).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    role: Role,
    content: String,
    created_at: Timestamp,
}

impl Message {
    /// Creates a new message with the given role and content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self::with_id(MessageId::new(), role, content)
    }

    /// Creates a message with a pre-allocated id.
    ///
    /// Used when the id is announced to observers before the content is
    /// final (streamed assistant replies).
    pub fn with_id(id: MessageId, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            created_at: Timestamp::now(),
        }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the message ID.
    pub fn id(&self) -> &MessageId {
        &self.id
    }

    /// Returns the role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns when the message was created.
    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    /// Returns true if this message is from the user.
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// Returns true if this message is from the assistant.
    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod message_id {
        use super::*;

        #[test]
        fn generates_unique_values() {
            assert_ne!(MessageId::new(), MessageId::new());
        }

        #[test]
        fn parses_from_valid_string() {
            let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
            let id: MessageId = uuid_str.parse().unwrap();
            assert_eq!(id.to_string(), uuid_str);
        }
    }

    mod role {
        use super::*;

        #[test]
        fn system_is_hidden_from_transcript() {
            assert!(!Role::System.is_user_visible());
            assert!(Role::User.is_user_visible());
            assert!(Role::Assistant.is_user_visible());
            assert!(Role::Data.is_user_visible());
        }

        #[test]
        fn serializes_to_snake_case() {
            assert_eq!(serde_json::to_string(&Role::Data).unwrap(), "\"data\"");
            assert_eq!(
                serde_json::to_string(&Role::Assistant).unwrap(),
                "\"assistant\""
            );
        }
    }

    mod construction {
        use super::*;

        #[test]
        fn empty_user_content_is_allowed() {
            let msg = Message::user("");
            assert!(msg.is_user());
            assert_eq!(msg.content(), "");
        }

        #[test]
        fn with_id_keeps_the_given_id() {
            let id = MessageId::new();
            let msg = Message::with_id(id, Role::Assistant, "Come si chiama?");
            assert_eq!(msg.id(), &id);
            assert!(msg.is_assistant());
        }
    }
}
