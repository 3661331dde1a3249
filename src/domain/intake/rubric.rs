//! Scoring rubric entries.
//!
//! Each entry describes one thought-and-language phenomenon together with the
//! template the assistant must follow when scoring it. Rubric files use
//! Italian keys (`fenomeno`, `descrizione`, ...); English keys are accepted
//! as aliases.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One phenomenon definition used by the scoring phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricEntry {
    #[serde(rename = "fenomeno", alias = "phenomenon")]
    pub phenomenon: String,

    #[serde(rename = "descrizione", alias = "description", default)]
    pub description: String,

    #[serde(rename = "esempio", alias = "example", default)]
    pub example: String,

    /// Scale label or numeric score; rubric files use both.
    #[serde(
        rename = "punteggio",
        alias = "score",
        default,
        deserialize_with = "string_or_number"
    )]
    pub score: String,

    /// Structured template the scoring reply must follow.
    #[serde(rename = "modello_di_output", alias = "output_model", default)]
    pub output_model: Value,
}

impl RubricEntry {
    /// The output template as prompt text.
    ///
    /// Plain strings are used verbatim, anything structured is rendered as
    /// pretty JSON.
    pub fn output_model_text(&self) -> String {
        match &self.output_model {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        }
    }
}

/// Top-level shape of a rubric file.
#[derive(Debug, Clone, Deserialize)]
pub struct RubricDocument {
    #[serde(rename = "transcription")]
    pub entries: Vec<RubricEntry>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}
