//! Per-chat conversation slots.
//!
//! Each chat gets one async mutex guarding its cached conversation. A turn
//! holds the mutex from before history is read until its snapshot has been
//! handed to the store, so turns for one chat run strictly one at a time.
//! Tokio mutexes queue waiters in FIFO order, which keeps turns in
//! submission order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::domain::conversation::ConversationState;
use crate::domain::foundation::ChatId;

/// Cached conversation for one chat.
#[derive(Debug, Default)]
pub struct ConversationSlot {
    /// `None` until first loaded from the store or created.
    pub state: Option<ConversationState>,
    /// Set when the in-memory log holds turns the store has not accepted.
    pub unsaved: bool,
}

pub type SharedSlot = Arc<tokio::sync::Mutex<ConversationSlot>>;

struct Entry {
    slot: SharedSlot,
    last_used: Instant,
}

#[derive(Default)]
pub struct ConversationSlots {
    entries: Mutex<HashMap<ChatId, Entry>>,
}

impl ConversationSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the chat's slot, creating an empty one on first use.
    pub fn slot(&self, chat_id: &ChatId) -> SharedSlot {
        let mut entries = lock(&self.entries);
        let entry = entries.entry(chat_id.clone()).or_insert_with(|| Entry {
            slot: SharedSlot::default(),
            last_used: Instant::now(),
        });
        entry.last_used = Instant::now();
        Arc::clone(&entry.slot)
    }

    /// Returns the chat's slot only if it is cached.
    pub fn existing(&self, chat_id: &ChatId) -> Option<SharedSlot> {
        lock(&self.entries).get(chat_id).map(|e| Arc::clone(&e.slot))
    }

    /// Drops idle slots that are neither in use nor holding unsaved turns.
    ///
    /// The next access reloads the conversation from the store.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|_, entry| {
            if Arc::strong_count(&entry.slot) > 1 || entry.last_used.elapsed() < max_idle {
                return true;
            }
            match entry.slot.try_lock() {
                Ok(slot) => slot.unsaved,
                Err(_) => true,
            }
        });
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
