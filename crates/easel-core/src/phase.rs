use serde::{Deserialize, Serialize};

/// Lifecycle of one session.
///
/// `Idle → Running → {Streaming, AwaitingToolResult, AwaitingStateSnapshot} → Done | Error`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Mailbox registered, run not started.
    #[default]
    Idle,
    Running,
    /// A model request is in flight.
    Streaming,
    AwaitingToolResult,
    /// Inside `get_canvas_state`; always left within the state timeout.
    AwaitingStateSnapshot,
    Done,
    Error,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Streaming => "streaming",
            Self::AwaitingToolResult => "awaiting_tool_result",
            Self::AwaitingStateSnapshot => "awaiting_state_snapshot",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_phases() {
        assert!(RunPhase::Done.is_terminal());
        assert!(RunPhase::Error.is_terminal());
        assert!(!RunPhase::AwaitingStateSnapshot.is_terminal());
        assert_eq!(RunPhase::default(), RunPhase::Idle);
    }

    #[test]
    fn as_str_matches_serde() {
        let phases = [
            RunPhase::Idle,
            RunPhase::Running,
            RunPhase::Streaming,
            RunPhase::AwaitingToolResult,
            RunPhase::AwaitingStateSnapshot,
            RunPhase::Done,
            RunPhase::Error,
        ];
        for phase in phases {
            assert_eq!(serde_json::to_value(phase).unwrap(), phase.as_str());
        }
    }
}
