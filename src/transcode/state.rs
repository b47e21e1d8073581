//! Transcoder state machine
//!
//! ```text
//!   Stopped ──feed──► Starting ──spawned──► Running ──broken pipe / exit──► Failed
//!      ▲                 │                                                  │
//!      │                 └──────────── spawn error ────────────────────────►│
//!      │                                                                    │
//!      └───────────── shutdown (from any state) ◄───── feed (after backoff) ┘
//! ```

use serde::Serialize;

/// Lifecycle state of the external encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscoderState {
    /// No process; the next feed launches one
    Stopped,
    /// Clearing stale output and spawning
    Starting,
    /// Process is alive and accepting frames
    Running,
    /// Process died or could not be launched; the next feed retries
    Failed,
}

impl TranscoderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscoderState::Stopped => "stopped",
            TranscoderState::Starting => "starting",
            TranscoderState::Running => "running",
            TranscoderState::Failed => "failed",
        }
    }

    /// Whether the machine may move from `self` to `next`
    pub fn can_transition_to(&self, next: TranscoderState) -> bool {
        use TranscoderState::*;

        matches!(
            (self, next),
            (Stopped, Starting)
                | (Failed, Starting)
                | (Starting, Running)
                | (Starting, Failed)
                | (Running, Failed)
                | (_, Stopped)
        )
    }

    /// Whether a feed in this state should attempt a launch
    pub fn needs_launch(&self) -> bool {
        matches!(self, TranscoderState::Stopped | TranscoderState::Failed)
    }
}

impl std::fmt::Display for TranscoderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TranscoderState::*;

    #[test]
    fn test_happy_path_transitions() {
        assert!(Stopped.can_transition_to(Starting));
        assert!(Starting.can_transition_to(Running));
        assert!(Running.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Starting));
    }

    #[test]
    fn test_shutdown_from_any_state() {
        for state in [Stopped, Starting, Running, Failed] {
            assert!(state.can_transition_to(Stopped));
        }
    }

    #[test]
    fn test_rejected_transitions() {
        assert!(!Stopped.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Running));
        assert!(!Running.can_transition_to(Starting));
        assert!(!Stopped.can_transition_to(Failed));
    }

    #[test]
    fn test_needs_launch() {
        assert!(Stopped.needs_launch());
        assert!(Failed.needs_launch());
        assert!(!Starting.needs_launch());
        assert!(!Running.needs_launch());
    }

    #[test]
    fn test_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Running).unwrap(), "\"running\"");
        assert_eq!(Failed.to_string(), "failed");
    }
}
