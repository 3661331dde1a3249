//! Intake domain module.
//!
//! Question sampling, the scoring rubric and the prompts sent to the model
//! for each interview phase.

mod prompt;
mod questions;
mod rubric;

pub use prompt::{Prompt, PromptBuilder, PromptError, IDENTITY_PROMPT, SCORED_RUBRIC_INDEX};
pub use questions::{
    QuestionBankPolicy, QuestionSample, QuestionSet, TranscriptDocument, TranscriptLine,
};
pub use rubric::{RubricDocument, RubricEntry};
