//! Wraps one model call as a sequence of token events closed by exactly one
//! terminal event.
//!
//! The streamer only produces; it never touches conversation state. The
//! orchestrator commits on the terminal event, so the persisted log can
//! never contain partial text.

use futures::StreamExt;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

use crate::domain::intake::Prompt;
use crate::ports::{ModelError, TokenStream};

use super::Session;

/// One step of a streamed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A partial text fragment.
    Token(String),
    /// The reply finished; carries the joined text.
    Completed(String),
    /// The call failed or timed out.
    Failed(ModelError),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Token(_))
    }
}

/// Starts model calls under a deadline.
#[derive(Debug, Clone, Copy)]
pub struct ResponseStreamer {
    timeout: Duration,
}

impl ResponseStreamer {
    /// `timeout` bounds the whole call, from request to last token.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Sends `prompt` on the session's connection.
    ///
    /// Never fails directly: a call that cannot start yields a stream whose
    /// only event is `Failed`.
    pub async fn stream(&self, session: &Session, prompt: &Prompt) -> ResponseStream {
        let deadline = Instant::now() + self.timeout;
        let started = timeout_at(deadline, session.connection().send_message(&prompt.text)).await;

        let (tokens, failure) = match started {
            Ok(Ok(tokens)) => (Some(tokens), None),
            Ok(Err(err)) => (None, Some(err)),
            Err(_) => (None, Some(self.timeout_error())),
        };

        ResponseStream {
            tokens,
            failure,
            text: String::new(),
            deadline,
            timeout: self.timeout,
            finished: false,
        }
    }

    fn timeout_error(&self) -> ModelError {
        ModelError::Timeout {
            timeout: self.timeout,
        }
    }
}

/// A reply in progress.
///
/// Dropping it drops the underlying token stream, which cancels the model
/// call.
pub struct ResponseStream {
    tokens: Option<TokenStream>,
    failure: Option<ModelError>,
    text: String,
    deadline: Instant,
    timeout: Duration,
    finished: bool,
}

impl ResponseStream {
    /// Next event, or `None` once the terminal event has been returned.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }
        if let Some(err) = self.failure.take() {
            return Some(self.finish(StreamEvent::Failed(err)));
        }
        let Some(tokens) = self.tokens.as_mut() else {
            return Some(self.finish(StreamEvent::Failed(ModelError::EmptyResponse)));
        };

        match timeout_at(self.deadline, tokens.next()).await {
            Ok(Some(Ok(token))) => {
                self.text.push_str(&token);
                Some(StreamEvent::Token(token))
            }
            Ok(Some(Err(err))) => Some(self.finish(StreamEvent::Failed(err))),
            Ok(None) if self.text.trim().is_empty() => {
                Some(self.finish(StreamEvent::Failed(ModelError::EmptyResponse)))
            }
            Ok(None) => {
                let text = std::mem::take(&mut self.text);
                Some(self.finish(StreamEvent::Completed(text)))
            }
            Err(_) => {
                let timeout = self.timeout;
                Some(self.finish(StreamEvent::Failed(ModelError::Timeout { timeout })))
            }
        }
    }

    fn finish(&mut self, event: StreamEvent) -> StreamEvent {
        self.finished = true;
        self.tokens = None;
        event
    }
}
