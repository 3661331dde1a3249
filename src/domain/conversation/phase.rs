//! Interview phases and how they are derived.
//!
//! A phase is never stored. It is recomputed on every turn from the number
//! of assistant messages so far and from what the patient just sent.

use serde::{Deserialize, Serialize};

/// Trigger phrase that asks for the interview results.
pub const DEFAULT_TRIGGER_PHRASE: &str = "FORNISCI I RISULTATI DELL'INTERVISTA";

/// The phase the assistant is in for the current turn.
///
/// Order is fixed: `Identity` happens exactly once, then `Interview` turns
/// repeat until the clinician requests `Scoring`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewPhase {
    /// Ask for name and date of birth.
    Identity,
    /// Ask one clinician question per turn.
    Interview,
    /// Evaluate the conversation against the rubric.
    Scoring,
}

impl InterviewPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Interview => "interview",
            Self::Scoring => "scoring",
        }
    }
}

impl std::fmt::Display for InterviewPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit intent attached to a submitted message.
///
/// `RequestResults` asks for scoring without relying on the free-text
/// trigger phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Reply,
    RequestResults,
}

/// Decides whether free text counts as a scoring request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerPolicy {
    phrase: String,
    honor_free_text: bool,
}

impl TriggerPolicy {
    /// Creates a policy matching `phrase`. When `honor_free_text` is false
    /// only the explicit intent can trigger scoring.
    pub fn new(phrase: impl AsRef<str>, honor_free_text: bool) -> Self {
        Self {
            phrase: normalize(phrase.as_ref()),
            honor_free_text,
        }
    }

    /// True iff `content`, trimmed and case-normalized, equals the phrase.
    ///
    /// Runs of inner whitespace collapse to one space. Anything else,
    /// including a prefix or suffix of the phrase, does not match.
    pub fn matches(&self, content: &str) -> bool {
        self.honor_free_text && !self.phrase.is_empty() && normalize(content) == self.phrase
    }

    /// Derives the phase for a turn.
    ///
    /// Identity always wins while no assistant message exists, whatever the
    /// user sent.
    pub fn phase_for(
        &self,
        assistant_message_count: usize,
        content: &str,
        kind: MessageKind,
    ) -> InterviewPhase {
        if assistant_message_count == 0 {
            InterviewPhase::Identity
        } else if kind == MessageKind::RequestResults || self.matches(content) {
            InterviewPhase::Scoring
        } else {
            InterviewPhase::Interview
        }
    }
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TRIGGER_PHRASE, true)
    }
}

/// Trims, collapses inner whitespace runs to one space and uppercases.
///
/// Both the phrase and the patient's text go through this before comparison,
/// so "fornisci  i\trisultati" and "FORNISCI I RISULTATI" compare equal.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}
