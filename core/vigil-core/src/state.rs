//! The closed set of semantic activity states.
//!
//! Every presented entity (the primary session and each orbital session)
//! shows exactly one of these at a time. The predicates below drive the
//! preemption rules in `display`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticState {
    Idle,
    Thinking,
    Coding,
    Reading,
    Searching,
    Executing,
    Testing,
    Installing,
    Committing,
    Reviewing,
    Subagent,
    Responding,
    Starting,
    Spawning,
    Waiting,
    Sleeping,
    Caffeinated,
    Ratelimited,
    Happy,
    Satisfied,
    Proud,
    Relieved,
    Error,
}

impl SemanticState {
    /// Positive completion states shown after a tool finishes cleanly.
    /// `Error` and `Ratelimited` are dramatic states, not outcomes.
    pub fn is_outcome(self) -> bool {
        matches!(
            self,
            SemanticState::Happy
                | SemanticState::Satisfied
                | SemanticState::Proud
                | SemanticState::Relieved
        )
    }

    /// States that represent an in-flight tool or response.
    pub fn is_work(self) -> bool {
        matches!(
            self,
            SemanticState::Coding
                | SemanticState::Reading
                | SemanticState::Searching
                | SemanticState::Executing
                | SemanticState::Testing
                | SemanticState::Installing
                | SemanticState::Committing
                | SemanticState::Reviewing
                | SemanticState::Subagent
                | SemanticState::Responding
        )
    }

    /// States a new work state may preempt without waiting out the dwell.
    pub fn is_interruptible(self) -> bool {
        matches!(
            self,
            SemanticState::Thinking
                | SemanticState::Idle
                | SemanticState::Sleeping
                | SemanticState::Waiting
        ) || self.is_outcome()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SemanticState::Idle => "idle",
            SemanticState::Thinking => "thinking",
            SemanticState::Coding => "coding",
            SemanticState::Reading => "reading",
            SemanticState::Searching => "searching",
            SemanticState::Executing => "executing",
            SemanticState::Testing => "testing",
            SemanticState::Installing => "installing",
            SemanticState::Committing => "committing",
            SemanticState::Reviewing => "reviewing",
            SemanticState::Subagent => "subagent",
            SemanticState::Responding => "responding",
            SemanticState::Starting => "starting",
            SemanticState::Spawning => "spawning",
            SemanticState::Waiting => "waiting",
            SemanticState::Sleeping => "sleeping",
            SemanticState::Caffeinated => "caffeinated",
            SemanticState::Ratelimited => "ratelimited",
            SemanticState::Happy => "happy",
            SemanticState::Satisfied => "satisfied",
            SemanticState::Proud => "proud",
            SemanticState::Relieved => "relieved",
            SemanticState::Error => "error",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "idle" => Some(SemanticState::Idle),
            "thinking" => Some(SemanticState::Thinking),
            "coding" => Some(SemanticState::Coding),
            "reading" => Some(SemanticState::Reading),
            "searching" => Some(SemanticState::Searching),
            "executing" => Some(SemanticState::Executing),
            "testing" => Some(SemanticState::Testing),
            "installing" => Some(SemanticState::Installing),
            "committing" => Some(SemanticState::Committing),
            "reviewing" => Some(SemanticState::Reviewing),
            "subagent" => Some(SemanticState::Subagent),
            "responding" => Some(SemanticState::Responding),
            "starting" => Some(SemanticState::Starting),
            "spawning" => Some(SemanticState::Spawning),
            "waiting" => Some(SemanticState::Waiting),
            "sleeping" => Some(SemanticState::Sleeping),
            "caffeinated" => Some(SemanticState::Caffeinated),
            "ratelimited" => Some(SemanticState::Ratelimited),
            "happy" => Some(SemanticState::Happy),
            "satisfied" => Some(SemanticState::Satisfied),
            "proud" => Some(SemanticState::Proud),
            "relieved" => Some(SemanticState::Relieved),
            "error" => Some(SemanticState::Error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_exclude_error() {
        assert!(SemanticState::Proud.is_outcome());
        assert!(!SemanticState::Error.is_outcome());
        assert!(!SemanticState::Ratelimited.is_outcome());
    }

    #[test]
    fn outcome_states_are_interruptible() {
        assert!(SemanticState::Happy.is_interruptible());
        assert!(SemanticState::Thinking.is_interruptible());
        assert!(!SemanticState::Coding.is_interruptible());
    }

    #[test]
    fn as_str_round_trips() {
        for state in [
            SemanticState::Idle,
            SemanticState::Caffeinated,
            SemanticState::Subagent,
            SemanticState::Error,
        ] {
            assert_eq!(SemanticState::from_str(state.as_str()), Some(state));
        }
    }
}
