//! Question Bank Port - Source of interview questions and the scoring rubric.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::intake::{QuestionSample, RubricEntry};

/// Errors raised while loading the rubric.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuestionBankError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("question bank timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Port for the external question bank.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// Samples a fresh set of candidate questions.
    ///
    /// Failures are reported as `QuestionSample::Unavailable`, never as a
    /// panic or an error. The caller decides whether to degrade or abort.
    async fn sample_questions(&self) -> QuestionSample;

    /// Loads the scoring rubric in file order.
    ///
    /// # Errors
    ///
    /// Any failure here aborts the scoring turn.
    async fn load_rubric(&self) -> Result<Vec<RubricEntry>, QuestionBankError>;
}
