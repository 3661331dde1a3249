//! Prompt construction for each interview phase.

use thiserror::Error;

use crate::domain::conversation::InterviewPhase;

use super::{QuestionSet, RubricEntry};

/// Instruction for the identity phase.
pub const IDENTITY_PROMPT: &str =
    "Chiedimi nome e data di nascita in modo professionale senza aggiungere dettagli superflui.";

/// Index of the rubric entry scored by the scoring phase.
pub const SCORED_RUBRIC_INDEX: usize = 0;

/// A rendered instruction ready to send to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub phase: InterviewPhase,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptError {
    #[error("rubric has no entry at index {index}")]
    RubricEntryMissing { index: usize },
}

/// Renders prompts. Holds no state, every input is passed per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Asks the model to request name and date of birth.
    pub fn identity(&self) -> Prompt {
        Prompt {
            phase: InterviewPhase::Identity,
            text: IDENTITY_PROMPT.to_string(),
        }
    }

    /// Asks the model to pick exactly one question from `questions`.
    ///
    /// An empty set still renders; the instructions tell the model to invent
    /// a pertinent question when none are left.
    pub fn interview(&self, patient_reply: &str, questions: &QuestionSet) -> Prompt {
        let text = format!(
            "RISPOSTA PAZIENTE: {patient_reply}

### Cosa devi fare:
1. Fase di controllo prima di considerare il punto 2:
   - Il paziente ha fornito **sia il nome che la data di nascita**, altrimenti richiedigli queste informazioni prima di procedere.
   - Controlla la risposta del paziente: se ha fatto una richiesta di chiarimento o altro, rispondi.
2. Scegli una sola domanda tra quelle elencate, considera solo le domande e non le affermazioni:
   - {questions}
   - DA ESCLUDERE: domanda del nome, affermazioni come \"va bene\", \"grazie\" e simili.
   - Se necessario, riformula la domanda per renderla più chiara.
   - Considera il contesto: alcune domande sono adatte solo dopo averne fatte altre.
   - Non considerare le affermazioni, devi scegliere una domanda tra le frasi disponibili.
   - Non ripetere mai domande già fatte. Se non ci sono domande nuove, inventane una pertinente.
⚠ IMPORTANTE: Scrivi solo il messaggio, senza spiegare le modifiche fatte.",
            questions = questions.bulleted(),
        );
        Prompt {
            phase: InterviewPhase::Interview,
            text,
        }
    }

    /// Asks the model to score the conversation against one rubric entry.
    ///
    /// Always scores the entry at [`SCORED_RUBRIC_INDEX`].
    pub fn scoring(&self, rubric: &[RubricEntry]) -> Result<Prompt, PromptError> {
        let entry = rubric
            .get(SCORED_RUBRIC_INDEX)
            .ok_or(PromptError::RubricEntryMissing {
                index: SCORED_RUBRIC_INDEX,
            })?;
        let text = format!(
            "- Problematica: {phenomenon}
- Descrizione: {description}
- Esempio: {example}
- Punteggio TLDS: {score}
**Valuta la presenza della problematica all'interno della conversazione avuta finora col paziente, usando il seguente modello:**
- Modello di output: {output}",
            phenomenon = entry.phenomenon,
            description = entry.description,
            example = entry.example,
            score = entry.score,
            output = entry.output_model_text(),
        );
        Ok(Prompt {
            phase: InterviewPhase::Scoring,
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn entry(name: &str) -> RubricEntry {
        RubricEntry {
            phenomenon: name.to_string(),
            description: format!("{name} descrizione"),
            example: format!("{name} esempio"),
            score: "0-4".to_string(),
            output_model: json!("Presenza: <si/no>"),
        }
    }

    #[test]
    fn identity_prompt_is_fixed() {
        let p = PromptBuilder::new().identity();
        assert_eq!(p.phase, InterviewPhase::Identity);
        assert_eq!(p.text, IDENTITY_PROMPT);
    }

    #[test]
    fn interview_echoes_reply_and_lists_questions() {
        let qs = QuestionSet::new(["Dorme bene?", "Lavora?"]);
        let p = PromptBuilder::new().interview("Mario Rossi, 10/05/1980", &qs);
        assert_eq!(p.phase, InterviewPhase::Interview);
        assert!(p.text.starts_with("RISPOSTA PAZIENTE: Mario Rossi, 10/05/1980"));
        assert!(p.text.contains("   - Dorme bene?\n- Lavora?\n"));
        assert!(p.text.contains("Non ripetere mai domande già fatte"));
        assert!(p.text.contains("Scrivi solo il messaggio"));
    }

    #[test]
    fn interview_with_no_questions_still_asks_to_invent() {
        let p = PromptBuilder::new().interview("ok", &QuestionSet::empty());
        assert!(p.text.contains("inventane una pertinente"));
    }

    #[test]
    fn scoring_embeds_every_field_of_first_entry() {
        let p = PromptBuilder::new()
            .scoring(&[entry("Perseverazione"), entry("Tangenzialità")])
            .unwrap();
        assert_eq!(p.phase, InterviewPhase::Scoring);
        assert!(p.text.contains("- Problematica: Perseverazione"));
        assert!(p.text.contains("- Descrizione: Perseverazione descrizione"));
        assert!(p.text.contains("- Esempio: Perseverazione esempio"));
        assert!(p.text.contains("- Punteggio TLDS: 0-4"));
        assert!(p.text.contains("- Modello di output: Presenza: <si/no>"));
        assert!(!p.text.contains("Tangenzialità"));
    }

    #[test]
    fn scoring_empty_rubric_is_an_error() {
        assert_eq!(
            PromptBuilder::new().scoring(&[]),
            Err(PromptError::RubricEntryMissing { index: 0 })
        );
    }

    proptest! {
        #[test]
        fn scoring_always_picks_index_zero(names in proptest::collection::vec("[A-Z][a-z]{3,10}", 1..6)) {
            let rubric: Vec<_> = names.iter().map(|n| entry(n)).collect();
            let p = PromptBuilder::new().scoring(&rubric).unwrap();
            let expected = format!("- Problematica: {}\n", names[0]);
            prop_assert!(p.text.starts_with(&expected));
        }
    }
}
