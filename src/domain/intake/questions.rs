//! Candidate interview questions sampled from the question bank.

use serde::{Deserialize, Serialize};

/// Ordered sequence of candidate clinician questions for one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionSet {
    questions: Vec<String>,
}

impl QuestionSet {
    /// Builds a set, dropping blank entries.
    pub fn new<I, S>(questions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            questions: questions
                .into_iter()
                .map(Into::into)
                .filter(|q| !q.trim().is_empty())
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Removes questions already present in the visible history.
    ///
    /// Comparison ignores case, surrounding whitespace and trailing
    /// punctuation, so a question the assistant rephrased only cosmetically
    /// is still treated as asked.
    pub fn without_asked<'a, I>(self, asked: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let asked: Vec<String> = asked.into_iter().map(comparable).collect();
        Self {
            questions: self
                .questions
                .into_iter()
                .filter(|q| !asked.contains(&comparable(q)))
                .collect(),
        }
    }

    /// Questions joined as a `- ` bulleted list.
    ///
    /// The first bullet marker is supplied by the prompt template.
    pub fn bulleted(&self) -> String {
        self.questions.join("\n- ")
    }
}

fn comparable(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .to_lowercase()
}

/// Outcome of asking the bank for questions.
///
/// The bank never decides whether a failure aborts the turn; the
/// orchestrator does, according to its configured policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionSample {
    Questions(QuestionSet),
    /// The bank was reachable but had nothing to offer.
    Empty,
    Unavailable { reason: String },
}

impl QuestionSample {
    /// Wraps a set, collapsing an empty one into `Empty`.
    pub fn from_set(set: QuestionSet) -> Self {
        if set.is_empty() {
            Self::Empty
        } else {
            Self::Questions(set)
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// What an interview turn does when the bank cannot supply questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionBankPolicy {
    /// Build the prompt with an empty list and let the model invent one.
    #[default]
    Degrade,
    /// Fail the turn.
    Abort,
}

/// One line of a recorded interview transcript.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptLine {
    pub role: String,
    pub text: String,
}

/// Top-level shape of a transcript file.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptDocument {
    pub transcription: Vec<TranscriptLine>,
}

impl TranscriptDocument {
    /// Lines spoken by `role`, in transcript order.
    pub fn questions_for(&self, role: &str) -> QuestionSet {
        QuestionSet::new(
            self.transcription
                .iter()
                .filter(|line| line.role == role)
                .map(|line| line.text.clone()),
        )
    }
}
