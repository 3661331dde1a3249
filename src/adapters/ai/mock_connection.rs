//! Mock model connector for testing.
//!
//! Provides a scripted implementation of the ModelConnector port, allowing
//! tests to run without calling a real model.
//!
//! # Features
//!
//! - Pre-configured replies consumed in order, shared by every connection
//! - Echo replies that repeat the prompt, for ordering checks
//! - Simulated delays for timeout testing
//! - Error injection, before the stream or midway through it
//! - Call and seeded-history tracking for verification
//!
//! # Example
//!
//! ```ignore
//! let connector = MockModelConnector::new()
//!     .with_reply("Come si chiama?")
//!     .with_delay(Duration::from_millis(10));
//!
//! let connection = connector.connect(&chat_id, &[]);
//! let tokens = connection.send_message("prompt").await?;
//! ```

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::sleep;

use crate::domain::conversation::Message;
use crate::domain::foundation::ChatId;
use crate::ports::{ModelConnection, ModelConnector, ModelError, TokenStream};

/// A scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Stream this text, one word per token.
    Text(String),
    /// Stream the prompt back, prefixed.
    Echo { prefix: String },
    /// Fail before any token is produced.
    Error(ModelError),
    /// Stream `partial`, then fail.
    FailMidway { partial: String, error: ModelError },
}

/// One recorded `send_message` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub chat_id: ChatId,
    pub prompt: String,
}

/// Mock connector for testing.
#[derive(Debug, Clone, Default)]
pub struct MockModelConnector {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    fallback: Option<MockReply>,
    delay: Duration,
    token_delay: Duration,
    calls: Arc<Mutex<Vec<MockCall>>>,
    connects: Arc<Mutex<Vec<(ChatId, Vec<Message>)>>>,
}

impl MockModelConnector {
    /// Creates a new mock connector with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a text reply to the queue.
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.with_scripted(MockReply::Text(text.into()))
    }

    /// Adds an error reply to the queue.
    pub fn with_error(self, error: ModelError) -> Self {
        self.with_scripted(MockReply::Error(error))
    }

    /// Adds any scripted reply to the queue.
    pub fn with_scripted(self, reply: MockReply) -> Self {
        lock(&self.replies).push_back(reply);
        self
    }

    /// Reply used once the queue is empty.
    pub fn with_fallback(mut self, reply: MockReply) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// Echoes every prompt once the queue is empty.
    pub fn echoing(self, prefix: impl Into<String>) -> Self {
        self.with_fallback(MockReply::Echo {
            prefix: prefix.into(),
        })
    }

    /// Sets simulated latency before the stream opens.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets simulated latency between tokens.
    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = delay;
        self
    }

    /// Returns the number of `send_message` calls across all connections.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Returns all recorded calls, oldest first.
    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    /// Prompts sent for one chat, oldest first.
    pub fn prompts_for(&self, chat_id: &ChatId) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter(|c| &c.chat_id == chat_id)
            .map(|c| c.prompt.clone())
            .collect()
    }

    /// Number of connections opened for `chat_id`.
    pub fn connect_count(&self, chat_id: &ChatId) -> usize {
        lock(&self.connects)
            .iter()
            .filter(|(c, _)| c == chat_id)
            .count()
    }

    /// History handed to the most recent `connect` for `chat_id`.
    pub fn seeded_history(&self, chat_id: &ChatId) -> Option<Vec<Message>> {
        lock(&self.connects)
            .iter()
            .rev()
            .find(|(c, _)| c == chat_id)
            .map(|(_, history)| history.clone())
    }

    fn next_reply(&self) -> MockReply {
        lock(&self.replies)
            .pop_front()
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| MockReply::Text("Mock response".to_string()))
    }
}

impl ModelConnector for MockModelConnector {
    fn connect(&self, chat_id: &ChatId, history: &[Message]) -> Arc<dyn ModelConnection> {
        lock(&self.connects).push((chat_id.clone(), history.to_vec()));
        Arc::new(MockConnection {
            chat_id: chat_id.clone(),
            connector: self.clone(),
        })
    }
}

/// A connection handed out by [`MockModelConnector`].
#[derive(Debug)]
pub struct MockConnection {
    chat_id: ChatId,
    connector: MockModelConnector,
}

#[async_trait]
impl ModelConnection for MockConnection {
    async fn send_message(&self, prompt: &str) -> Result<TokenStream, ModelError> {
        lock(&self.connector.calls).push(MockCall {
            chat_id: self.chat_id.clone(),
            prompt: prompt.to_string(),
        });

        if !self.connector.delay.is_zero() {
            sleep(self.connector.delay).await;
        }

        let token_delay = self.connector.token_delay;
        let (text, error) = match self.connector.next_reply() {
            MockReply::Text(text) => (text, None),
            MockReply::Echo { prefix } => (format!("{prefix}{prompt}"), None),
            MockReply::Error(err) => return Err(err),
            MockReply::FailMidway { partial, error } => (partial, Some(error)),
        };

        let tokens: Vec<Result<String, ModelError>> = text
            .split_inclusive(' ')
            .map(|t| Ok(t.to_string()))
            .chain(error.map(Err))
            .collect();

        Ok(stream::iter(tokens)
            .then(move |token| async move {
                if !token_delay.is_zero() {
                    sleep(token_delay).await;
                }
                token
            })
            .boxed())
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(tokens: TokenStream) -> Vec<Result<String, ModelError>> {
        tokens.collect().await
    }

    fn chat(id: &str) -> ChatId {
        ChatId::new(id).unwrap()
    }

    #[tokio::test]
    async fn replies_are_consumed_in_order() {
        let connector = MockModelConnector::new().with_reply("First").with_reply("Second");
        let conn = connector.connect(&chat("c1"), &[]);

        let first = collect(conn.send_message("p1").await.unwrap()).await;
        let second = collect(conn.send_message("p2").await.unwrap()).await;

        assert_eq!(first, vec![Ok("First".to_string())]);
        assert_eq!(second, vec![Ok("Second".to_string())]);
    }

    #[tokio::test]
    async fn text_is_split_into_word_tokens() {
        let connector = MockModelConnector::new().with_reply("Come si chiama?");
        let conn = connector.connect(&chat("c1"), &[]);

        let tokens: Vec<String> = collect(conn.send_message("p").await.unwrap())
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(tokens, vec!["Come ", "si ", "chiama?"]);
        assert_eq!(tokens.concat(), "Come si chiama?");
    }

    #[tokio::test]
    async fn default_reply_after_queue_is_exhausted() {
        let connector = MockModelConnector::new();
        let conn = connector.connect(&chat("c1"), &[]);
        let tokens = collect(conn.send_message("p").await.unwrap()).await;
        assert_eq!(tokens.len(), 2);
    }

    #[tokio::test]
    async fn echo_repeats_prompt() {
        let connector = MockModelConnector::new().echoing("ECHO:");
        let conn = connector.connect(&chat("c1"), &[]);
        let text: String = collect(conn.send_message("ciao").await.unwrap())
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(text, "ECHO:ciao");
    }

    #[tokio::test]
    async fn injected_error_fails_the_call() {
        let connector = MockModelConnector::new().with_error(ModelError::AuthenticationFailed);
        let conn = connector.connect(&chat("c1"), &[]);
        assert_eq!(
            conn.send_message("p").await.err(),
            Some(ModelError::AuthenticationFailed)
        );
    }

    #[tokio::test]
    async fn midway_failure_ends_stream_with_error() {
        let connector = MockModelConnector::new().with_scripted(MockReply::FailMidway {
            partial: "Come si".to_string(),
            error: ModelError::network("reset"),
        });
        let conn = connector.connect(&chat("c1"), &[]);
        let tokens = collect(conn.send_message("p").await.unwrap()).await;
        assert_eq!(tokens.len(), 3);
        assert!(tokens[2].is_err());
    }

    #[tokio::test]
    async fn tracks_calls_and_connections_per_chat() {
        let connector = MockModelConnector::new();
        let a = connector.connect(&chat("a"), &[]);
        let _b = connector.connect(&chat("b"), &[Message::user("ciao")]);

        let _ = a.send_message("one").await.unwrap();
        let _ = a.send_message("two").await.unwrap();

        assert_eq!(connector.call_count(), 2);
        assert_eq!(connector.prompts_for(&chat("a")), vec!["one", "two"]);
        assert!(connector.prompts_for(&chat("b")).is_empty());
        assert_eq!(connector.connect_count(&chat("a")), 1);
        assert_eq!(connector.connect_count(&chat("b")), 1);
        assert_eq!(connector.seeded_history(&chat("a")), Some(vec![]));
        assert_eq!(connector.seeded_history(&chat("b")).unwrap().len(), 1);
        assert_eq!(connector.seeded_history(&chat("c")), None);
    }
}
