//! Question bank configuration

use serde::Deserialize;
use std::path::PathBuf;

use super::error::ValidationError;

/// Where transcripts and the scoring rubric live on disk
#[derive(Debug, Clone, Deserialize)]
pub struct BankConfig {
    /// Folder of recorded interview transcripts (`.json`)
    #[serde(default = "default_transcripts_dir")]
    pub transcripts_dir: PathBuf,

    /// Scoring rubric document
    #[serde(default = "default_rubric_path")]
    pub rubric_path: PathBuf,

    /// Transcript role whose lines are used as candidate questions
    #[serde(default = "default_interviewer_role")]
    pub interviewer_role: String,
}

impl BankConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interviewer_role.trim().is_empty() {
            return Err(ValidationError::MissingRequired("BANK__INTERVIEWER_ROLE"));
        }
        Ok(())
    }
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            transcripts_dir: default_transcripts_dir(),
            rubric_path: default_rubric_path(),
            interviewer_role: default_interviewer_role(),
        }
    }
}

fn default_transcripts_dir() -> PathBuf {
    PathBuf::from("data/trascrizioni")
}

fn default_rubric_path() -> PathBuf {
    PathBuf::from("data/tald/jsonTald.json")
}

fn default_interviewer_role() -> String {
    crate::adapters::bank::DEFAULT_INTERVIEWER_ROLE.to_string()
}
