//! Process-wide registry of live model sessions, one per chat.
//!
//! # Concurrency
//!
//! The map sits behind a synchronous mutex that is never held across an
//! `.await`. Get-or-create therefore runs as one critical section: two
//! callers racing on an unseen chat id both receive the same session and the
//! connector is asked for exactly one connection.
//!
//! A session created for a chat that already has messages (after a restart,
//! an idle eviction or an explicit close) is seeded with those messages.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::domain::conversation::Message;
use crate::domain::foundation::ChatId;
use crate::ports::{ModelConnection, ModelConnector};

/// A chat's live model dialogue.
pub struct Session {
    chat_id: ChatId,
    connection: Arc<dyn ModelConnection>,
    last_used: Mutex<Instant>,
}

impl Session {
    fn new(chat_id: ChatId, connection: Arc<dyn ModelConnection>) -> Self {
        Self {
            chat_id,
            connection,
            last_used: Mutex::new(Instant::now()),
        }
    }

    pub fn chat_id(&self) -> &ChatId {
        &self.chat_id
    }

    pub fn connection(&self) -> &dyn ModelConnection {
        self.connection.as_ref()
    }

    /// Time since the session was last handed out.
    pub fn idle_for(&self) -> Duration {
        lock(&self.last_used).elapsed()
    }

    fn touch(&self) {
        *lock(&self.last_used) = Instant::now();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("chat_id", &self.chat_id)
            .field("model", &self.connection.model_name())
            .field("idle_for", &self.idle_for())
            .finish()
    }
}

/// Keyed registry of sessions with atomic get-or-create.
pub struct SessionRegistry {
    connector: Arc<dyn ModelConnector>,
    sessions: Mutex<HashMap<ChatId, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new(connector: Arc<dyn ModelConnector>) -> Self {
        Self {
            connector,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the chat's session, creating it on first use.
    ///
    /// `history` seeds a newly created session and is ignored when one
    /// already exists.
    pub fn get_or_create(&self, chat_id: &ChatId, history: &[Message]) -> Arc<Session> {
        let mut sessions = lock(&self.sessions);
        let session = sessions.entry(chat_id.clone()).or_insert_with(|| {
            tracing::info!(chat_id = %chat_id, seeded = history.len(), "creating model session");
            Arc::new(Session::new(
                chat_id.clone(),
                self.connector.connect(chat_id, history),
            ))
        });
        session.touch();
        Arc::clone(session)
    }

    /// Returns the chat's session without creating one.
    pub fn get(&self, chat_id: &ChatId) -> Option<Arc<Session>> {
        lock(&self.sessions).get(chat_id).cloned()
    }

    /// Drops the chat's session. The next turn opens a fresh dialogue.
    ///
    /// A turn already holding the session finishes on the old connection.
    pub fn close(&self, chat_id: &ChatId) -> bool {
        let removed = lock(&self.sessions).remove(chat_id).is_some();
        if removed {
            tracing::info!(chat_id = %chat_id, "closed model session");
        }
        removed
    }

    /// Drops sessions idle for at least `max_idle` that no turn is using.
    ///
    /// Returns how many were dropped.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = lock(&self.sessions);
        let before = sessions.len();
        sessions.retain(|chat_id, session| {
            let keep = Arc::strong_count(session) > 1 || session.idle_for() < max_idle;
            if !keep {
                tracing::debug!(chat_id = %chat_id, "evicting idle model session");
            }
            keep
        });
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockModelConnector;

    fn chat(id: &str) -> ChatId {
        ChatId::new(id).unwrap()
    }

    fn registry() -> (MockModelConnector, SessionRegistry) {
        let connector = MockModelConnector::new();
        let registry = SessionRegistry::new(Arc::new(connector.clone()));
        (connector, registry)
    }

    #[test]
    fn get_or_create_reuses_existing_session() {
        let (connector, registry) = registry();
        let a = registry.get_or_create(&chat("c1"), &[]);
        let b = registry.get_or_create(&chat("c1"), &[]);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(connector.connect_count(&chat("c1")), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn sessions_are_keyed_by_chat() {
        let (_, registry) = registry();
        let a = registry.get_or_create(&chat("a"), &[]);
        let b = registry.get_or_create(&chat("b"), &[]);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(b.chat_id(), &chat("b"));
    }

    #[test]
    fn concurrent_callers_share_one_connection() {
        let (connector, registry) = registry();
        let registry = Arc::new(registry);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.get_or_create(&chat("race"), &[]))
            })
            .collect();
        let sessions: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(sessions.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(connector.connect_count(&chat("race")), 1);
    }

    #[test]
    fn get_does_not_create() {
        let (connector, registry) = registry();
        assert!(registry.get(&chat("c1")).is_none());
        assert_eq!(connector.connect_count(&chat("c1")), 0);
    }

    #[test]
    fn close_forces_a_new_connection() {
        let (connector, registry) = registry();
        registry.get_or_create(&chat("c1"), &[]);
        assert!(registry.close(&chat("c1")));
        assert!(!registry.close(&chat("c1")));

        registry.get_or_create(&chat("c1"), &[]);
        assert_eq!(connector.connect_count(&chat("c1")), 2);
    }

    #[test]
    fn history_seeds_only_new_sessions() {
        let (connector, registry) = registry();
        let history = vec![Message::user("ciao"), Message::assistant("Nome?")];

        registry.get_or_create(&chat("c1"), &history);
        registry.get_or_create(&chat("c1"), &[]);

        assert_eq!(connector.connect_count(&chat("c1")), 1);
        assert_eq!(connector.seeded_history(&chat("c1")), Some(history.clone()));

        registry.evict_idle(Duration::ZERO);
        let mut longer = history.clone();
        longer.push(Message::user("Mario"));
        registry.get_or_create(&chat("c1"), &longer);

        assert_eq!(connector.connect_count(&chat("c1")), 2);
        assert_eq!(connector.seeded_history(&chat("c1")), Some(longer));
    }

    #[test]
    fn evict_idle_skips_sessions_in_use() {
        let (_, registry) = registry();
        let held = registry.get_or_create(&chat("busy"), &[]);
        registry.get_or_create(&chat("idle"), &[]);

        let evicted = registry.evict_idle(Duration::ZERO);

        assert_eq!(evicted, 1);
        assert!(registry.get(&chat("busy")).is_some());
        assert!(registry.get(&chat("idle")).is_none());
        drop(held);
    }

    #[test]
    fn evict_idle_keeps_recent_sessions() {
        let (_, registry) = registry();
        registry.get_or_create(&chat("c1"), &[]);
        assert_eq!(registry.evict_idle(Duration::from_secs(3600)), 0);
        assert_eq!(registry.len(), 1);
    }
}
