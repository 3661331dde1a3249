//! Turn-taking orchestrator for clinical-intake conversations.
//!
//! A turn walks `AwaitingInput → PromptBuilt → ModelCalled → Streaming →
//! Committed`, or ends in `Failed`. The user message is appended before the
//! prompt is built and is never rolled back. The assistant message is
//! appended only on the streamer's terminal event, then the full snapshot is
//! handed to the chat store exactly once.
//!
//! Turns for one chat are serialized by the chat's slot mutex, which is
//! acquired before the first `.await` of a submission. Different chats never
//! wait on each other.
//!
//! A submission dropped after its turn started still publishes `Failed`, so
//! event subscribers always see a terminal event. The user message stays in
//! the unsaved history.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::domain::conversation::{
    ChatSnapshot, ConversationState, InterviewPhase, Message, MessageId, MessageKind, Role,
    TriggerPolicy, TurnState,
};
use crate::domain::foundation::{ChatId, StateMachine, UserId};
use crate::domain::intake::{
    Prompt, PromptBuilder, QuestionBankPolicy, QuestionSample, QuestionSet,
};
use crate::ports::{ChatStore, ChatStoreError, ModelConnector, QuestionBank, QuestionBankError};

use super::conversations::{ConversationSlot, ConversationSlots};
use super::events::{TurnEvent, TurnEventHub};
use super::session_registry::SessionRegistry;
use super::streamer::{ResponseStreamer, StreamEvent};

/// Reply committed when the model fails or returns nothing.
pub const DEFAULT_FALLBACK_REPLY: &str = "Nessuna risposta valida.";

/// Error published for a turn that stopped before committing a reply.
pub const TURN_INTERRUPTED: &str = "turn interrupted before a reply was committed";

/// Behavioral settings for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub fallback_reply: String,
    pub trigger: TriggerPolicy,
    pub question_bank_policy: QuestionBankPolicy,
    pub model_timeout: Duration,
    pub bank_timeout: Duration,
    pub persistence_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_string(),
            trigger: TriggerPolicy::default(),
            question_bank_policy: QuestionBankPolicy::Degrade,
            model_timeout: Duration::from_secs(120),
            bank_timeout: Duration::from_secs(10),
            persistence_timeout: Duration::from_secs(30),
        }
    }
}

/// Command to submit new user content for a chat.
#[derive(Debug, Clone)]
pub struct SubmitUserMessage {
    pub chat_id: ChatId,
    pub owner: UserId,
    pub content: String,
    pub kind: MessageKind,
}

impl SubmitUserMessage {
    pub fn new(chat_id: ChatId, owner: UserId, content: impl Into<String>) -> Self {
        Self {
            chat_id,
            owner,
            content: content.into(),
            kind: MessageKind::Reply,
        }
    }

    /// Marks the message as an explicit request for the interview results.
    pub fn requesting_results(mut self) -> Self {
        self.kind = MessageKind::RequestResults;
        self
    }
}

/// Result of a committed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReceipt {
    /// Id of the appended assistant message.
    pub id: MessageId,
    /// Final assistant text.
    pub reply: String,
    pub phase: InterviewPhase,
    /// True when the model failed and the fallback reply was committed.
    pub fallback: bool,
}

/// Errors that end a turn.
#[derive(Debug, Clone, Error)]
pub enum TurnError {
    /// The scoring rubric could not be loaded or had no usable entry.
    #[error("scoring rubric unavailable: {0}")]
    RubricMissing(String),

    /// The bank failed and the policy says to abort.
    #[error("question bank unavailable: {0}")]
    QuestionBankUnavailable(String),

    /// The stored history could not be read, so the turn never started.
    #[error("conversation history unavailable: {0}")]
    HistoryUnavailable(String),

    /// The turn committed in memory but the store rejected the snapshot.
    #[error("turn committed but not persisted: {reason}")]
    PersistenceFailed { receipt: TurnReceipt, reason: String },

    #[error("invalid turn transition: {0}")]
    InvalidTransition(String),
}

/// Counts from one eviction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub sessions: usize,
    pub conversations: usize,
    pub channels: usize,
}

/// Sequences prompt building, the model call and persistence for each turn.
pub struct IntakeOrchestrator {
    sessions: SessionRegistry,
    conversations: ConversationSlots,
    events: TurnEventHub,
    bank: Arc<dyn QuestionBank>,
    store: Arc<dyn ChatStore>,
    prompts: PromptBuilder,
    streamer: ResponseStreamer,
    config: OrchestratorConfig,
}

impl IntakeOrchestrator {
    pub fn new(
        connector: Arc<dyn ModelConnector>,
        bank: Arc<dyn QuestionBank>,
        store: Arc<dyn ChatStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            sessions: SessionRegistry::new(connector),
            conversations: ConversationSlots::new(),
            events: TurnEventHub::with_default_capacity(),
            bank,
            store,
            prompts: PromptBuilder::new(),
            streamer: ResponseStreamer::new(config.model_timeout),
            config,
        }
    }

    /// Runs one full turn for `cmd.chat_id`.
    ///
    /// # Errors
    ///
    /// - `RubricMissing` / `QuestionBankUnavailable`: no assistant message
    ///   was appended and nothing was persisted.
    /// - `PersistenceFailed`: the turn is committed in memory; the receipt is
    ///   included and [`persist`](Self::persist) retries the save.
    pub async fn submit_user_message(
        &self,
        cmd: SubmitUserMessage,
    ) -> Result<TurnReceipt, TurnError> {
        // Taking the slot is synchronous, so queue position is fixed on the
        // first poll.
        let slot = self.conversations.slot(&cmd.chat_id);
        let mut guard = slot.lock().await;
        let cached: &mut ConversationSlot = &mut guard;

        let state = match cached.state.take() {
            Some(state) => state,
            None => self.load_or_start(&cmd.chat_id, &cmd.owner).await?,
        };
        let state = cached.state.insert(state);

        let message_id = MessageId::new();
        let mut turn = TurnGuard::new(&self.events, &cmd.chat_id, message_id);

        let phase = self.config.trigger.phase_for(
            state.assistant_message_count(),
            &cmd.content,
            cmd.kind,
        );
        let prior_messages = state.len();
        state.append(Message::user(cmd.content.clone()));
        cached.unsaved = true;

        tracing::info!(chat_id = %cmd.chat_id, %phase, "turn started");

        let prompt = match self.build_prompt(phase, &cmd.content, state).await {
            Ok(prompt) => prompt,
            Err(err) => return Err(turn.fail(err)),
        };
        turn.advance(TurnState::PromptBuilt)?;

        // The new user message reaches the model as the prompt, not as history.
        let session = self
            .sessions
            .get_or_create(&cmd.chat_id, &state.messages()[..prior_messages]);
        let mut stream = self.streamer.stream(&session, &prompt).await;
        turn.advance(TurnState::ModelCalled)?;
        turn.advance(TurnState::Streaming)?;

        let mut reply = None;
        while let Some(event) = stream.next_event().await {
            match event {
                StreamEvent::Token(delta) => {
                    self.events
                        .publish(&cmd.chat_id, TurnEvent::Token { message_id, delta });
                }
                StreamEvent::Completed(text) => reply = Some(text),
                StreamEvent::Failed(err) => {
                    tracing::warn!(
                        chat_id = %cmd.chat_id,
                        error = %err,
                        retryable = err.is_retryable(),
                        "model call failed, committing fallback reply"
                    );
                }
            }
        }
        drop(stream);
        drop(session);

        let fallback = reply.is_none();
        let reply = reply.unwrap_or_else(|| self.config.fallback_reply.clone());

        state.append(Message::with_id(message_id, Role::Assistant, reply.clone()));
        turn.advance(TurnState::Committed)?;
        tracing::info!(chat_id = %cmd.chat_id, %phase, fallback, "turn committed");

        self.events.publish(
            &cmd.chat_id,
            TurnEvent::Committed {
                message_id,
                phase,
                content: reply.clone(),
            },
        );

        let receipt = TurnReceipt {
            id: message_id,
            reply,
            phase,
            fallback,
        };

        let snapshot = state.snapshot();
        match self.save(&snapshot).await {
            Ok(()) => {
                cached.unsaved = false;
                Ok(receipt)
            }
            Err(err) => {
                tracing::error!(chat_id = %cmd.chat_id, error = %err, "failed to persist turn");
                Err(TurnError::PersistenceFailed {
                    receipt,
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Retries persistence of the chat's in-memory history.
    ///
    /// A no-op when the chat is not cached.
    pub async fn persist(&self, chat_id: &ChatId) -> Result<(), ChatStoreError> {
        let Some(slot) = self.conversations.existing(chat_id) else {
            return Ok(());
        };
        let mut guard = slot.lock().await;
        let Some(snapshot) = guard.state.as_ref().map(ConversationState::snapshot) else {
            return Ok(());
        };
        self.save(&snapshot).await?;
        guard.unsaved = false;
        Ok(())
    }

    /// Current view of a chat: the cached history if present, else the
    /// stored one.
    ///
    /// Waits for an in-flight turn on the chat to finish.
    pub async fn conversation(
        &self,
        chat_id: &ChatId,
    ) -> Result<Option<ChatSnapshot>, ChatStoreError> {
        if let Some(slot) = self.conversations.existing(chat_id) {
            let guard = slot.lock().await;
            if let Some(state) = &guard.state {
                return Ok(Some(state.snapshot()));
            }
        }
        self.load(chat_id).await
    }

    /// Subscribes to token and commit events for a chat.
    pub fn subscribe(&self, chat_id: &ChatId) -> broadcast::Receiver<TurnEvent> {
        self.events.subscribe(chat_id)
    }

    /// Ends the chat's model dialogue. History is kept.
    pub fn close_session(&self, chat_id: &ChatId) -> bool {
        self.sessions.close(chat_id)
    }

    /// Number of live model sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Drops sessions, cached conversations and event channels idle for at
    /// least `max_idle`. Anything an in-flight turn holds is kept, as is any
    /// conversation with unsaved turns.
    pub async fn evict_idle(&self, max_idle: Duration) -> EvictionReport {
        let report = EvictionReport {
            sessions: self.sessions.evict_idle(max_idle),
            conversations: self.conversations.evict_idle(max_idle),
            channels: self.events.prune(),
        };
        if report != EvictionReport::default() {
            tracing::info!(
                sessions = report.sessions,
                conversations = report.conversations,
                channels = report.channels,
                "evicted idle chats"
            );
        }
        report
    }

    /// Runs [`evict_idle`](Self::evict_idle) every `interval` until
    /// `shutdown` flips to true.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        max_idle: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::debug!("session sweeper stopped");
                            return;
                        }
                    }
                    _ = ticker.tick() => {
                        orchestrator.evict_idle(max_idle).await;
                    }
                }
            }
        })
    }

    async fn build_prompt(
        &self,
        phase: InterviewPhase,
        content: &str,
        state: &ConversationState,
    ) -> Result<Prompt, TurnError> {
        match phase {
            InterviewPhase::Identity => Ok(self.prompts.identity()),
            InterviewPhase::Scoring => {
                let rubric = match timeout(self.config.bank_timeout, self.bank.load_rubric()).await
                {
                    Ok(Ok(rubric)) => rubric,
                    Ok(Err(err)) => return Err(TurnError::RubricMissing(err.to_string())),
                    Err(_) => return Err(TurnError::RubricMissing(self.bank_timeout().to_string())),
                };
                self.prompts
                    .scoring(&rubric)
                    .map_err(|err| TurnError::RubricMissing(err.to_string()))
            }
            InterviewPhase::Interview => {
                let questions = self.sample_questions(state).await?;
                Ok(self.prompts.interview(content, &questions))
            }
        }
    }

    async fn sample_questions(&self, state: &ConversationState) -> Result<QuestionSet, TurnError> {
        let sample = timeout(self.config.bank_timeout, self.bank.sample_questions())
            .await
            .unwrap_or_else(|_| QuestionSample::unavailable(self.bank_timeout().to_string()));

        match sample {
            QuestionSample::Questions(set) => Ok(set.without_asked(state.asked_questions())),
            QuestionSample::Empty => {
                tracing::warn!(chat_id = %state.chat_id(), "question bank returned no questions");
                Ok(QuestionSet::empty())
            }
            QuestionSample::Unavailable { reason } => match self.config.question_bank_policy {
                QuestionBankPolicy::Degrade => {
                    tracing::warn!(
                        chat_id = %state.chat_id(),
                        %reason,
                        "question bank unavailable, continuing without candidates"
                    );
                    Ok(QuestionSet::empty())
                }
                QuestionBankPolicy::Abort => Err(TurnError::QuestionBankUnavailable(reason)),
            },
        }
    }

    fn bank_timeout(&self) -> QuestionBankError {
        QuestionBankError::Timeout {
            timeout: self.config.bank_timeout,
        }
    }

    async fn load_or_start(
        &self,
        chat_id: &ChatId,
        owner: &UserId,
    ) -> Result<ConversationState, TurnError> {
        match self.load(chat_id).await {
            Ok(Some(snapshot)) => Ok(ConversationState::from_snapshot(snapshot)),
            Ok(None) => Ok(ConversationState::new(chat_id.clone(), owner.clone())),
            Err(err) => {
                tracing::error!(chat_id = %chat_id, error = %err, "failed to load conversation");
                Err(TurnError::HistoryUnavailable(err.to_string()))
            }
        }
    }

    async fn load(&self, chat_id: &ChatId) -> Result<Option<ChatSnapshot>, ChatStoreError> {
        timeout(self.config.persistence_timeout, self.store.load(chat_id))
            .await
            .unwrap_or_else(|_| {
                Err(ChatStoreError::Timeout {
                    timeout: self.config.persistence_timeout,
                })
            })
    }

    async fn save(&self, snapshot: &ChatSnapshot) -> Result<(), ChatStoreError> {
        timeout(self.config.persistence_timeout, self.store.save(snapshot))
            .await
            .unwrap_or_else(|_| {
                Err(ChatStoreError::Timeout {
                    timeout: self.config.persistence_timeout,
                })
            })
    }
}

/// Tracks one turn's state and reports turns that end without a terminal
/// state.
///
/// Dropping the guard before `Committed` or `Failed` (the submission future
/// was cancelled, or a transition was rejected) publishes `Failed`.
struct TurnGuard<'a> {
    events: &'a TurnEventHub,
    chat_id: &'a ChatId,
    message_id: MessageId,
    state: TurnState,
}

impl<'a> TurnGuard<'a> {
    fn new(events: &'a TurnEventHub, chat_id: &'a ChatId, message_id: MessageId) -> Self {
        Self {
            events,
            chat_id,
            message_id,
            state: TurnState::AwaitingInput,
        }
    }

    fn advance(&mut self, to: TurnState) -> Result<(), TurnError> {
        let next = self
            .state
            .transition_to(to)
            .map_err(|e| TurnError::InvalidTransition(e.to_string()))?;
        tracing::debug!(
            chat_id = %self.chat_id,
            from = self.state.as_str(),
            to = next.as_str(),
            "turn transition"
        );
        self.state = next;
        Ok(())
    }

    fn fail(&mut self, err: TurnError) -> TurnError {
        let from = self.state;
        if let Err(invalid) = self.advance(TurnState::Failed) {
            return invalid;
        }
        tracing::error!(chat_id = %self.chat_id, from = from.as_str(), error = %err, "turn failed");
        self.events.publish(
            self.chat_id,
            TurnEvent::Failed {
                message_id: self.message_id,
                error: err.to_string(),
            },
        );
        err
    }

    fn is_finished(&self) -> bool {
        matches!(self.state, TurnState::Committed | TurnState::Failed)
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        if self.is_finished() {
            return;
        }
        tracing::warn!(
            chat_id = %self.chat_id,
            state = self.state.as_str(),
            "turn interrupted before commit"
        );
        self.events.publish(
            self.chat_id,
            TurnEvent::Failed {
                message_id: self.message_id,
                error: TURN_INTERRUPTED.to_string(),
            },
        );
    }
}

impl std::fmt::Debug for IntakeOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntakeOrchestrator")
            .field("sessions", &self.sessions.len())
            .field("conversations", &self.conversations.len())
            .field("config", &self.config)
            .finish()
    }
}
