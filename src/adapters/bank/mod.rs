//! Question Bank Adapters
//!
//! - **FileQuestionBank** - transcripts and rubric read from JSON files

mod file_question_bank;

pub use file_question_bank::{FileQuestionBank, DEFAULT_INTERVIEWER_ROLE};
