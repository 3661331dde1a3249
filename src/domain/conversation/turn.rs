//! Lifecycle of a single conversation turn.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::StateMachine;

/// Where a turn is in its lifecycle.
///
/// ```text
/// AwaitingInput → PromptBuilt → ModelCalled → Streaming → Committed
///        └──────────────┴─────────────┴────────────┴──→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    AwaitingInput,
    PromptBuilt,
    ModelCalled,
    Streaming,
    Committed,
    Failed,
}

impl TurnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingInput => "awaiting_input",
            Self::PromptBuilt => "prompt_built",
            Self::ModelCalled => "model_called",
            Self::Streaming => "streaming",
            Self::Committed => "committed",
            Self::Failed => "failed",
        }
    }
}

impl StateMachine for TurnState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use TurnState::*;
        matches!(
            (self, target),
            (AwaitingInput, PromptBuilt)
                | (PromptBuilt, ModelCalled)
                | (ModelCalled, Streaming)
                | (Streaming, Committed)
                | (AwaitingInput | PromptBuilt | ModelCalled | Streaming, Failed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use TurnState::*;
        match self {
            AwaitingInput => vec![PromptBuilt, Failed],
            PromptBuilt => vec![ModelCalled, Failed],
            ModelCalled => vec![Streaming, Failed],
            Streaming => vec![Committed, Failed],
            Committed | Failed => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TurnState; 6] = [
        TurnState::AwaitingInput,
        TurnState::PromptBuilt,
        TurnState::ModelCalled,
        TurnState::Streaming,
        TurnState::Committed,
        TurnState::Failed,
    ];

    #[test]
    fn happy_path_is_linear() {
        let s = TurnState::AwaitingInput
            .transition_to(TurnState::PromptBuilt)
            .and_then(|s| s.transition_to(TurnState::ModelCalled))
            .and_then(|s| s.transition_to(TurnState::Streaming))
            .and_then(|s| s.transition_to(TurnState::Committed));
        assert_eq!(s, Ok(TurnState::Committed));
    }

    #[test]
    fn cannot_skip_streaming() {
        assert!(TurnState::ModelCalled
            .transition_to(TurnState::Committed)
            .is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(TurnState::Committed.is_terminal());
        assert!(TurnState::Failed.is_terminal());
        assert!(!TurnState::Streaming.is_terminal());
    }

    #[test]
    fn every_live_state_can_fail() {
        for state in ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(state.can_transition_to(&TurnState::Failed), "{state:?}");
        }
    }

    #[test]
    fn can_transition_to_agrees_with_valid_transitions() {
        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(&to),
                    from.valid_transitions().contains(&to),
                    "{from:?} -> {to:?}"
                );
            }
        }
    }
}
