//! File-based Question Bank Adapter
//!
//! Candidate questions come from recorded interview transcripts, one JSON
//! file per interview. Each call picks one transcript at random and returns
//! the interviewer's lines. The rubric is a single JSON file.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::domain::intake::{QuestionSample, RubricDocument, RubricEntry, TranscriptDocument};
use crate::ports::{QuestionBank, QuestionBankError};

/// Transcript role whose lines are used as questions.
pub const DEFAULT_INTERVIEWER_ROLE: &str = "medico";

/// File-backed question bank
#[derive(Debug, Clone)]
pub struct FileQuestionBank {
    transcripts_dir: PathBuf,
    rubric_path: PathBuf,
    interviewer_role: String,
}

impl FileQuestionBank {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(transcripts_dir: P, rubric_path: Q) -> Self {
        Self {
            transcripts_dir: transcripts_dir.as_ref().to_path_buf(),
            rubric_path: rubric_path.as_ref().to_path_buf(),
            interviewer_role: DEFAULT_INTERVIEWER_ROLE.to_string(),
        }
    }

    pub fn with_interviewer_role(mut self, role: impl Into<String>) -> Self {
        self.interviewer_role = role.into();
        self
    }

    async fn transcript_files(&self) -> Result<Vec<PathBuf>, String> {
        let mut entries = fs::read_dir(&self.transcripts_dir)
            .await
            .map_err(|e| format!("cannot read {}: {e}", self.transcripts_dir.display()))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| format!("cannot list {}: {e}", self.transcripts_dir.display()))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        Ok(files)
    }

    async fn try_sample(&self) -> Result<QuestionSample, String> {
        let files = self.transcript_files().await?;
        let picked = files
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| format!("no transcript files in {}", self.transcripts_dir.display()))?;

        tracing::debug!(file = %picked.display(), "sampling questions from transcript");

        let raw = fs::read_to_string(&picked)
            .await
            .map_err(|e| format!("cannot read {}: {e}", picked.display()))?;
        let doc: TranscriptDocument = serde_json::from_str(&raw)
            .map_err(|e| format!("invalid transcript {}: {e}", picked.display()))?;

        Ok(QuestionSample::from_set(
            doc.questions_for(&self.interviewer_role),
        ))
    }
}

#[async_trait]
impl QuestionBank for FileQuestionBank {
    async fn sample_questions(&self) -> QuestionSample {
        match self.try_sample().await {
            Ok(sample) => sample,
            Err(reason) => {
                tracing::warn!(%reason, "question bank unavailable");
                QuestionSample::unavailable(reason)
            }
        }
    }

    async fn load_rubric(&self) -> Result<Vec<RubricEntry>, QuestionBankError> {
        let raw = match fs::read_to_string(&self.rubric_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(QuestionBankError::NotFound(
                    self.rubric_path.display().to_string(),
                ))
            }
            Err(e) => return Err(QuestionBankError::Io(e.to_string())),
        };

        let doc: RubricDocument =
            serde_json::from_str(&raw).map_err(|e| QuestionBankError::Parse(e.to_string()))?;
        Ok(doc.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::intake::QuestionSet;
    use tempfile::TempDir;

    const TRANSCRIPT: &str = r#"{"transcription":[
        {"role":"medico","text":"Come si chiama?"},
        {"role":"paziente","text":"Mario"},
        {"role":"medico","text":"Dorme bene la notte?"}
    ]}"#;

    const RUBRIC: &str = r#"{"transcription":[
        {"fenomeno":"Perseverazione","descrizione":"d","esempio":"e","punteggio":"0-4","modello_di_output":"m"},
        {"fenomeno":"Tangenzialità","descrizione":"d","esempio":"e","punteggio":2,"modello_di_output":{"k":"v"}}
    ]}"#;

    fn bank(dir: &TempDir) -> FileQuestionBank {
        FileQuestionBank::new(dir.path().join("trascrizioni"), dir.path().join("tald.json"))
    }

    fn write(dir: &TempDir, rel: &str, body: &str) {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    mod sample_questions {
        use super::*;

        #[tokio::test]
        async fn returns_interviewer_lines_only() {
            let dir = TempDir::new().unwrap();
            write(&dir, "trascrizioni/a.json", TRANSCRIPT);

            match bank(&dir).sample_questions().await {
                QuestionSample::Questions(set) => {
                    assert_eq!(set.questions(), ["Come si chiama?", "Dorme bene la notte?"]);
                }
                other => panic!("expected questions, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn custom_role_is_honored() {
            let dir = TempDir::new().unwrap();
            write(&dir, "trascrizioni/a.json", TRANSCRIPT);

            let sample = bank(&dir)
                .with_interviewer_role("paziente")
                .sample_questions()
                .await;
            assert_eq!(
                sample,
                QuestionSample::Questions(QuestionSet::new(["Mario"]))
            );
        }

        #[tokio::test]
        async fn ignores_non_json_files() {
            let dir = TempDir::new().unwrap();
            write(&dir, "trascrizioni/notes.txt", "not a transcript");
            write(&dir, "trascrizioni/a.json", TRANSCRIPT);

            for _ in 0..5 {
                assert!(matches!(
                    bank(&dir).sample_questions().await,
                    QuestionSample::Questions(_)
                ));
            }
        }

        #[tokio::test]
        async fn missing_folder_is_unavailable() {
            let dir = TempDir::new().unwrap();
            assert!(matches!(
                bank(&dir).sample_questions().await,
                QuestionSample::Unavailable { .. }
            ));
        }

        #[tokio::test]
        async fn empty_folder_is_unavailable() {
            let dir = TempDir::new().unwrap();
            std::fs::create_dir_all(dir.path().join("trascrizioni")).unwrap();
            assert!(matches!(
                bank(&dir).sample_questions().await,
                QuestionSample::Unavailable { .. }
            ));
        }

        #[tokio::test]
        async fn invalid_shape_is_unavailable() {
            let dir = TempDir::new().unwrap();
            write(&dir, "trascrizioni/a.json", r#"{"domande":[]}"#);
            assert!(matches!(
                bank(&dir).sample_questions().await,
                QuestionSample::Unavailable { .. }
            ));
        }

        #[tokio::test]
        async fn transcript_without_interviewer_lines_is_empty() {
            let dir = TempDir::new().unwrap();
            write(
                &dir,
                "trascrizioni/a.json",
                r#"{"transcription":[{"role":"paziente","text":"ciao"}]}"#,
            );
            assert_eq!(bank(&dir).sample_questions().await, QuestionSample::Empty);
        }
    }

    mod load_rubric {
        use super::*;

        #[tokio::test]
        async fn keeps_file_order() {
            let dir = TempDir::new().unwrap();
            write(&dir, "tald.json", RUBRIC);

            let rubric = bank(&dir).load_rubric().await.unwrap();
            assert_eq!(rubric.len(), 2);
            assert_eq!(rubric[0].phenomenon, "Perseverazione");
            assert_eq!(rubric[1].score, "2");
        }

        #[tokio::test]
        async fn missing_file_is_not_found() {
            let dir = TempDir::new().unwrap();
            assert!(matches!(
                bank(&dir).load_rubric().await,
                Err(QuestionBankError::NotFound(_))
            ));
        }

        #[tokio::test]
        async fn malformed_file_is_parse_error() {
            let dir = TempDir::new().unwrap();
            write(&dir, "tald.json", "{");
            assert!(matches!(
                bank(&dir).load_rubric().await,
                Err(QuestionBankError::Parse(_))
            ));
        }
    }
}
