//! Gemini Connection - Stateful dialogue with Google's Gemini API.
//!
//! Each connection keeps its own list of exchanged turns and resends it with
//! every prompt, the way a chat session does.
//!
//! # Configuration
//!
//! ```ignore
//! let config = GeminiConfig::new(api_key)
//!     .with_model("gemini-2.0-pro-exp-02-05")
//!     .with_timeout(Duration::from_secs(120));
//!
//! let connector = GeminiConnector::new(config)?;
//! let connection = connector.connect(&chat_id, state.messages());
//! ```
//!
//! # Streaming
//!
//! Calls `streamGenerateContent?alt=sse`. Each SSE `data:` payload is a
//! partial `GenerateContentResponse` carrying the next text fragment.

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::domain::conversation::{Message, Role};
use crate::domain::foundation::ChatId;
use crate::ports::{ModelConnection, ModelConnector, ModelError, TokenStream};

/// Configuration for Gemini connections.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key for authentication.
    api_key: Secret<String>,
    /// Model to use (e.g., "gemini-2.0-pro-exp-02-05").
    pub model: String,
    /// Base URL for the API (default: https://generativelanguage.googleapis.com).
    pub base_url: String,
    /// Request timeout, covering the whole streamed body.
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Creates a new configuration with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            model: "gemini-2.0-pro-exp-02-05".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Creates a configuration from an already wrapped secret.
    pub fn from_secret(api_key: Secret<String>) -> Self {
        Self {
            api_key,
            ..Self::new(String::new())
        }
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Mints one [`GeminiConnection`] per conversation.
///
/// The HTTP client is shared; dialogue history is not.
pub struct GeminiConnector {
    config: Arc<GeminiConfig>,
    client: Client,
}

impl GeminiConnector {
    /// Creates a connector.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::Unavailable` if the HTTP client cannot be built.
    pub fn new(config: GeminiConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ModelError::unavailable(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }
}

impl ModelConnector for GeminiConnector {
    fn connect(&self, chat_id: &ChatId, history: &[Message]) -> Arc<dyn ModelConnection> {
        let connection = self.open(history);
        tracing::debug!(
            chat_id = %chat_id,
            model = %self.config.model,
            seeded_turns = connection.history_len(),
            "opening gemini dialogue"
        );
        Arc::new(connection)
    }
}

impl GeminiConnector {
    fn open(&self, history: &[Message]) -> GeminiConnection {
        GeminiConnection {
            config: Arc::clone(&self.config),
            client: self.client.clone(),
            history: Arc::new(Mutex::new(seed_history(history))),
        }
    }
}

/// Converts stored messages into Gemini turns.
///
/// Gemini rejects empty text parts, so blank messages are dropped. Adjacent
/// messages with the same role (a user message whose reply failed, followed
/// by a retry) are merged into one turn.
fn seed_history(messages: &[Message]) -> Vec<Content> {
    let mut contents: Vec<Content> = Vec::new();
    for message in messages {
        let role = match message.role() {
            Role::User => "user",
            Role::Assistant => "model",
            Role::System | Role::Data => continue,
        };
        if message.content().trim().is_empty() {
            continue;
        }
        match contents.last_mut() {
            Some(last) if last.role == role => last.parts.push(Part {
                text: Some(message.content().to_string()),
            }),
            _ => contents.push(Content {
                role: role.to_string(),
                parts: vec![Part {
                    text: Some(message.content().to_string()),
                }],
            }),
        }
    }
    contents
}

/// One Gemini dialogue.
pub struct GeminiConnection {
    config: Arc<GeminiConfig>,
    client: Client,
    history: Arc<Mutex<Vec<Content>>>,
}

impl GeminiConnection {
    /// Number of turns (user and model) recorded so far.
    pub fn history_len(&self) -> usize {
        lock(&self.history).len()
    }

    fn request_body(&self, prompt: &str) -> GenerateContentRequest {
        let mut contents = lock(&self.history).clone();
        contents.push(Content::user(prompt));
        GenerateContentRequest { contents }
    }

    async fn send_request(&self, body: &GenerateContentRequest) -> Result<Response, ModelError> {
        self.client
            .post(self.config.stream_url())
            .header("x-goog-api-key", self.config.api_key())
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.config.timeout))
    }

    async fn handle_response_status(response: Response) -> Result<Response, ModelError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u32>().ok());
        let error_body = response.text().await.unwrap_or_default();

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ModelError::AuthenticationFailed,
            StatusCode::TOO_MANY_REQUESTS => ModelError::RateLimited {
                retry_after_secs: retry_after.unwrap_or(60),
            },
            s if s.is_server_error() => {
                ModelError::unavailable(format!("server error {s}: {error_body}"))
            }
            s => ModelError::network(format!("unexpected status {s}: {error_body}")),
        })
    }
}

#[async_trait]
impl ModelConnection for GeminiConnection {
    async fn send_message(&self, prompt: &str) -> Result<TokenStream, ModelError> {
        let body = self.request_body(prompt);
        let response = self.send_request(&body).await?;
        let response = Self::handle_response_status(response).await?;

        let timeout = self.config.timeout;
        let bytes = response
            .bytes_stream()
            .map(move |chunk| {
                chunk
                    .map(|b| b.to_vec())
                    .map_err(|e| map_transport_error(e, timeout))
            })
            .boxed();

        let reply = ReplyStream {
            bytes,
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            text: String::new(),
            prompt: prompt.to_string(),
            history: Arc::clone(&self.history),
            exhausted: false,
            failed: false,
        };

        Ok(Box::pin(stream::unfold(reply, ReplyStream::next_token)))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ModelError>> + Send>>;

/// Unfold state for one streamed reply.
struct ReplyStream {
    bytes: ByteStream,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, ModelError>>,
    text: String,
    prompt: String,
    history: Arc<Mutex<Vec<Content>>>,
    exhausted: bool,
    failed: bool,
}

impl ReplyStream {
    async fn next_token(mut self) -> Option<(Result<String, ModelError>, Self)> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                match &item {
                    Ok(token) => self.text.push_str(token),
                    Err(_) => {
                        self.failed = true;
                        self.pending.clear();
                    }
                }
                return Some((item, self));
            }
            if self.failed {
                return None;
            }
            if self.exhausted {
                self.commit();
                return None;
            }
            match self.bytes.next().await {
                Some(Ok(chunk)) => {
                    for data in self.decoder.push(&chunk) {
                        self.pending.extend(parse_gemini_event(&data));
                    }
                }
                Some(Err(e)) => self.pending.push_back(Err(e)),
                None => {
                    for data in self.decoder.finish() {
                        self.pending.extend(parse_gemini_event(&data));
                    }
                    self.exhausted = true;
                }
            }
        }
    }

    /// Records the finished exchange so the next prompt carries it.
    fn commit(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let mut history = lock(&self.history);
        history.push(Content::user(std::mem::take(&mut self.prompt)));
        history.push(Content::model(std::mem::take(&mut self.text)));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn map_transport_error(e: reqwest::Error, timeout: Duration) -> ModelError {
    if e.is_timeout() {
        ModelError::Timeout { timeout }
    } else if e.is_connect() {
        ModelError::network(format!("connection failed: {e}"))
    } else {
        ModelError::network(e.to_string())
    }
}

/// Splits an SSE byte stream into `data:` payloads.
///
/// Chunk boundaries may fall anywhere, including inside a UTF-8 sequence, so
/// bytes are buffered until a full line is available.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feeds bytes and returns every event completed by them.
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.feed_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes a trailing event not followed by a blank line.
    fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = String::from_utf8_lossy(&rest);
        let mut events = Vec::new();
        if let Some(event) = self.feed_line(rest.trim_end_matches(['\n', '\r'])) {
            events.push(event);
        }
        if !self.data.is_empty() {
            events.push(self.data.drain(..).collect::<Vec<_>>().join("\n"));
        }
        events
    }

    fn feed_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            if self.data.is_empty() {
                return None;
            }
            return Some(self.data.drain(..).collect::<Vec<_>>().join("\n"));
        }
        if let Some(data) = line.strip_prefix("data:") {
            self.data.push(data.strip_prefix(' ').unwrap_or(data).to_string());
        }
        None
    }
}

/// Converts one SSE payload into text tokens or an error.
fn parse_gemini_event(data: &str) -> Vec<Result<String, ModelError>> {
    let event: StreamEvent = match serde_json::from_str(data) {
        Ok(event) => event,
        Err(e) => return vec![Err(ModelError::parse(format!("invalid stream event: {e}")))],
    };

    if let Some(error) = event.error {
        return vec![Err(ModelError::unavailable(
            error.message.unwrap_or_else(|| "stream error".to_string()),
        ))];
    }

    event
        .candidates
        .into_iter()
        .take(1)
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .filter_map(|p| p.text)
        .filter(|t| !t.is_empty())
        .map(Ok)
        .collect()
}

// ----- Gemini API Types -----

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }

    fn model(text: impl Into<String>) -> Self {
        Self {
            role: "model".to_string(),
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> GeminiConnection {
        GeminiConnector::new(GeminiConfig::new("test-key"))
            .unwrap()
            .open(&[])
    }

    #[test]
    fn config_builder_works() {
        let config = GeminiConfig::new("test-key")
            .with_model("gemini-1.5-flash")
            .with_base_url("https://custom.api.com/")
            .with_timeout(Duration::from_secs(30));

        assert_eq!(config.model, "gemini-1.5-flash");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.api_key(), "test-key");
        assert_eq!(
            config.stream_url(),
            "https://custom.api.com/v1beta/models/gemini-1.5-flash:streamGenerateContent?alt=sse"
        );
    }

    #[test]
    fn request_body_appends_prompt_to_history() {
        let conn = connection();
        lock(&conn.history).push(Content::user("first"));
        lock(&conn.history).push(Content::model("reply"));

        let body = conn.request_body("second");
        let roles: Vec<_> = body.contents.iter().map(|c| c.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
        assert_eq!(conn.history_len(), 2);
    }

    #[tokio::test]
    async fn history_is_recorded_only_after_stream_completes() {
        let conn = connection();
        let payload = b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Come \"}]}}]}\n\n\
data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"si chiama?\"}]}}]}\n\n"
            .to_vec();
        let reply = ReplyStream {
            bytes: stream::iter(vec![Ok(payload)]).boxed(),
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            text: String::new(),
            prompt: "prompt".to_string(),
            history: Arc::clone(&conn.history),
            exhausted: false,
            failed: false,
        };
        let mut tokens = Box::pin(stream::unfold(reply, ReplyStream::next_token));

        assert_eq!(tokens.next().await.unwrap().unwrap(), "Come ");
        assert_eq!(conn.history_len(), 0);
        assert_eq!(tokens.next().await.unwrap().unwrap(), "si chiama?");
        assert!(tokens.next().await.is_none());
        assert_eq!(conn.history_len(), 2);
    }

    #[tokio::test]
    async fn failed_stream_leaves_history_untouched() {
        let conn = connection();
        let reply = ReplyStream {
            bytes: stream::iter(vec![
                Ok(b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Co\"}]}}]}\n\n".to_vec()),
                Err(ModelError::network("reset")),
            ])
            .boxed(),
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            text: String::new(),
            prompt: "prompt".to_string(),
            history: Arc::clone(&conn.history),
            exhausted: false,
            failed: false,
        };
        let items: Vec<_> = stream::unfold(reply, ReplyStream::next_token).collect().await;

        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
        assert_eq!(conn.history_len(), 0);
    }

    mod seeding {
        use super::*;

        #[test]
        fn connect_seeds_user_and_assistant_turns() {
            let connector = GeminiConnector::new(GeminiConfig::new("test-key")).unwrap();
            let conn = connector.open(&[
                Message::user("ciao"),
                Message::assistant("Nome e data di nascita?"),
                Message::user("Mario, 1970"),
                Message::assistant("Dorme bene?"),
            ]);

            assert_eq!(conn.history_len(), 4);
            let body = conn.request_body("next");
            let roles: Vec<_> = body.contents.iter().map(|c| c.role.as_str()).collect();
            assert_eq!(roles, vec!["user", "model", "user", "model", "user"]);
        }

        #[test]
        fn blank_and_system_messages_are_skipped() {
            let history = seed_history(&[
                Message::user(""),
                Message::system("istruzioni"),
                Message::assistant("Nome?"),
            ]);

            assert_eq!(history.len(), 1);
            assert_eq!(history[0].role, "model");
        }

        #[test]
        fn consecutive_same_role_messages_merge() {
            let history = seed_history(&[
                Message::user("prima"),
                Message::user("riprovo"),
                Message::assistant("Nome?"),
            ]);

            assert_eq!(history.len(), 2);
            assert_eq!(history[0].parts.len(), 2);
        }

        #[test]
        fn seeded_connections_do_not_share_history() {
            let connector = GeminiConnector::new(GeminiConfig::new("test-key")).unwrap();
            let seeded = connector.open(&[Message::user("ciao"), Message::assistant("Nome?")]);
            let fresh = connector.open(&[]);

            assert_eq!(seeded.history_len(), 2);
            assert_eq!(fresh.history_len(), 0);
        }
    }

    mod sse {
        use super::*;

        #[test]
        fn joins_events_split_across_chunks() {
            let mut decoder = SseDecoder::default();
            assert!(decoder.push(b"data: {\"a\":").is_empty());
            let events = decoder.push(b"1}\n\ndata: {\"b\":2}\n\n");
            assert_eq!(events, vec!["{\"a\":1}", "{\"b\":2}"]);
        }

        #[test]
        fn keeps_multibyte_characters_split_across_chunks() {
            let mut decoder = SseDecoder::default();
            let bytes = "data: però\n\n".as_bytes();
            let split = bytes.len() - 4;
            assert!(decoder.push(&bytes[..split]).is_empty());
            assert_eq!(decoder.push(&bytes[split..]), vec!["però"]);
        }

        #[test]
        fn finish_flushes_unterminated_event() {
            let mut decoder = SseDecoder::default();
            assert!(decoder.push(b"data: tail").is_empty());
            assert_eq!(decoder.finish(), vec!["tail"]);
        }

        #[test]
        fn parses_text_parts() {
            let tokens = parse_gemini_event(
                r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Dorme "},{"text":"bene?"}]}}]}"#,
            );
            let tokens: Vec<_> = tokens.into_iter().map(Result::unwrap).collect();
            assert_eq!(tokens, vec!["Dorme ", "bene?"]);
        }

        #[test]
        fn error_payload_becomes_model_error() {
            let tokens = parse_gemini_event(r#"{"error":{"code":503,"message":"overloaded"}}"#);
            assert_eq!(
                tokens,
                vec![Err(ModelError::unavailable("overloaded"))]
            );
        }

        #[test]
        fn malformed_payload_is_a_parse_error() {
            let tokens = parse_gemini_event("not json");
            assert!(matches!(tokens[0], Err(ModelError::Parse(_))));
        }
    }
}
