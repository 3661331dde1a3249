//! Per-chat fan-out of turn progress to UI subscribers.
//!
//! Subscribers only ever observe; history is written by the orchestrator
//! alone. Lagging subscribers miss events rather than slowing a turn down.
//!
//! Publishing is synchronous so a turn dropped mid-flight can still report
//! its failure from a destructor. The map lock is never held across an
//! `.await`.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

use crate::domain::conversation::{InterviewPhase, MessageId};
use crate::domain::foundation::ChatId;

/// Progress of the assistant reply for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// A fragment of the reply.
    Token {
        message_id: MessageId,
        delta: String,
    },
    /// The reply was appended to history.
    Committed {
        message_id: MessageId,
        phase: InterviewPhase,
        content: String,
    },
    /// The turn failed; no assistant message was appended.
    Failed {
        message_id: MessageId,
        error: String,
    },
}

/// Broadcast channels keyed by chat.
pub struct TurnEventHub {
    channels: RwLock<HashMap<ChatId, broadcast::Sender<TurnEvent>>>,
    channel_capacity: usize,
}

impl TurnEventHub {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            channel_capacity,
        }
    }

    /// Create with default capacity (256 events).
    pub fn with_default_capacity() -> Self {
        Self::new(256)
    }

    /// Subscribes to a chat's events, opening its channel if needed.
    pub fn subscribe(&self, chat_id: &ChatId) -> broadcast::Receiver<TurnEvent> {
        let mut channels = self.write();
        channels
            .entry(chat_id.clone())
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0)
            .subscribe()
    }

    /// Sends to current subscribers. Returns how many received it.
    pub fn publish(&self, chat_id: &ChatId, event: TurnEvent) -> usize {
        self.read()
            .get(chat_id)
            .and_then(|tx| tx.send(event).ok())
            .unwrap_or(0)
    }

    /// Closes channels nobody listens to. Returns how many were closed.
    pub fn prune(&self) -> usize {
        let mut channels = self.write();
        let before = channels.len();
        channels.retain(|_, tx| tx.receiver_count() > 0);
        before - channels.len()
    }

    pub fn channel_count(&self) -> usize {
        self.read().len()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ChatId, broadcast::Sender<TurnEvent>>> {
        self.channels.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ChatId, broadcast::Sender<TurnEvent>>> {
        self.channels.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TurnEventHub {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(id: &str) -> ChatId {
        ChatId::new(id).unwrap()
    }

    fn token(delta: &str) -> TurnEvent {
        TurnEvent::Token {
            message_id: MessageId::new(),
            delta: delta.to_string(),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_events_for_their_chat_only() {
        let hub = TurnEventHub::new(16);
        let mut a = hub.subscribe(&chat("a"));
        let mut b = hub.subscribe(&chat("b"));

        assert_eq!(hub.publish(&chat("a"), token("x")), 1);

        assert!(matches!(a.recv().await.unwrap(), TurnEvent::Token { delta, .. } if delta == "x"));
        assert!(b.try_recv().is_err());
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let hub = TurnEventHub::new(16);
        assert_eq!(hub.publish(&chat("a"), token("x")), 0);
        assert_eq!(hub.channel_count(), 0);
    }

    #[test]
    fn prune_drops_abandoned_channels() {
        let hub = TurnEventHub::new(16);
        let rx = hub.subscribe(&chat("a"));
        let _kept = hub.subscribe(&chat("b"));
        drop(rx);

        assert_eq!(hub.prune(), 1);
        assert_eq!(hub.channel_count(), 1);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(token("ciao")).unwrap();
        assert_eq!(json["type"], "token");
        assert_eq!(json["delta"], "ciao");
    }
}
