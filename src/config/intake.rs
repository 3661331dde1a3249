//! Interview behavior configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::{OrchestratorConfig, DEFAULT_FALLBACK_REPLY};
use crate::domain::conversation::{TriggerPolicy, DEFAULT_TRIGGER_PHRASE};
use crate::domain::intake::QuestionBankPolicy;

/// How turns are phased, degraded and persisted
#[derive(Debug, Clone, Deserialize)]
pub struct IntakeConfig {
    /// Reply committed when the model fails
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,

    /// Free-text phrase that requests the interview results
    #[serde(default = "default_trigger_phrase")]
    pub trigger_phrase: String,

    /// When false only an explicit results request triggers scoring
    #[serde(default = "default_true")]
    pub honor_trigger_phrase: bool,

    /// What an interview turn does when the bank is unavailable
    #[serde(default)]
    pub question_bank_policy: QuestionBankPolicy,

    /// Deadline for one chat store call, in seconds
    #[serde(default = "default_persistence_timeout")]
    pub persistence_timeout_secs: u64,

    /// Deadline for one question bank call, in seconds
    #[serde(default = "default_bank_timeout")]
    pub bank_timeout_secs: u64,
}

impl IntakeConfig {
    /// Combines these settings with the model deadline.
    pub fn to_orchestrator_config(&self, model_timeout: Duration) -> OrchestratorConfig {
        OrchestratorConfig {
            fallback_reply: self.fallback_reply.clone(),
            trigger: TriggerPolicy::new(&self.trigger_phrase, self.honor_trigger_phrase),
            question_bank_policy: self.question_bank_policy,
            model_timeout,
            bank_timeout: Duration::from_secs(self.bank_timeout_secs),
            persistence_timeout: Duration::from_secs(self.persistence_timeout_secs),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.fallback_reply.trim().is_empty() {
            return Err(ValidationError::BlankFallbackReply);
        }
        if self.honor_trigger_phrase && self.trigger_phrase.trim().is_empty() {
            return Err(ValidationError::BlankTriggerPhrase);
        }
        if self.persistence_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout("persistence"));
        }
        if self.bank_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout("question bank"));
        }
        Ok(())
    }
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            fallback_reply: default_fallback_reply(),
            trigger_phrase: default_trigger_phrase(),
            honor_trigger_phrase: true,
            question_bank_policy: QuestionBankPolicy::default(),
            persistence_timeout_secs: default_persistence_timeout(),
            bank_timeout_secs: default_bank_timeout(),
        }
    }
}

fn default_fallback_reply() -> String {
    DEFAULT_FALLBACK_REPLY.to_string()
}

fn default_trigger_phrase() -> String {
    DEFAULT_TRIGGER_PHRASE.to_string()
}

fn default_true() -> bool {
    true
}

fn default_persistence_timeout() -> u64 {
    30
}

fn default_bank_timeout() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::{InterviewPhase, MessageKind};

    #[test]
    fn test_intake_config_defaults() {
        let config = IntakeConfig::default();
        assert_eq!(config.fallback_reply, "Nessuna risposta valida.");
        assert_eq!(config.question_bank_policy, QuestionBankPolicy::Degrade);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_orchestrator_config_carries_timeouts() {
        let config = IntakeConfig {
            persistence_timeout_secs: 5,
            bank_timeout_secs: 2,
            ..Default::default()
        };
        let orchestrator = config.to_orchestrator_config(Duration::from_secs(60));
        assert_eq!(orchestrator.model_timeout, Duration::from_secs(60));
        assert_eq!(orchestrator.persistence_timeout, Duration::from_secs(5));
        assert_eq!(orchestrator.bank_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_disabled_trigger_phrase_only_honors_explicit_request() {
        let config = IntakeConfig {
            honor_trigger_phrase: false,
            ..Default::default()
        };
        let trigger = config.to_orchestrator_config(Duration::from_secs(1)).trigger;
        assert_eq!(
            trigger.phase_for(1, DEFAULT_TRIGGER_PHRASE, MessageKind::Reply),
            InterviewPhase::Interview
        );
        assert_eq!(
            trigger.phase_for(1, "", MessageKind::RequestResults),
            InterviewPhase::Scoring
        );
    }

    #[test]
    fn test_blank_values_rejected() {
        let config = IntakeConfig {
            fallback_reply: "".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::BlankFallbackReply)
        ));

        let config = IntakeConfig {
            trigger_phrase: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::BlankTriggerPhrase)
        ));
    }
}
