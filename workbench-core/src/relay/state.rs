//! Relay connection state machine.
//!
//! Models the lifecycle of one connection attempt to the hardware relay
//! with validated transitions that return `Result` instead of panicking.

use std::time::Instant;

use crate::error::WorkbenchError;

// ── LinkPhase ────────────────────────────────────────────────────

/// The current phase of the relay link.
///
/// ```text
///  Disconnected ──► Connecting ──► Registered ──► Streaming
///       ▲               │              │              │
///       └───────────────┴──────────────┴──────────────┘
///              (any I/O error or explicit stop)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LinkPhase {
    /// No active connection. Initial / terminal state.
    #[default]
    Disconnected,

    /// A new channel to the relay endpoint is being opened.
    Connecting,

    /// Channel is up and `registerClient` has been sent.
    Registered,

    /// Subscriptions have been resynced; reading notifications.
    Streaming {
        /// When the link entered the `Streaming` state.
        since: Instant,
    },
}

impl std::fmt::Display for LinkPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Registered => write!(f, "Registered"),
            Self::Streaming { .. } => write!(f, "Streaming"),
        }
    }
}

impl LinkPhase {
    /// Returns `true` while the link is delivering relay notifications.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming { .. })
    }

    /// Returns `true` when the link is idle between attempts.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// How long the link has been in the `Streaming` state.
    ///
    /// Returns `None` for any other phase.
    pub fn streaming_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Streaming { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connecting`.
    ///
    /// Valid from: `Disconnected`.
    pub fn begin_connect(&mut self) -> Result<(), WorkbenchError> {
        match self {
            Self::Disconnected => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(WorkbenchError::StateViolation(
                "cannot connect: not in Disconnected state",
            )),
        }
    }

    /// Transition to `Registered` after `registerClient` went out.
    ///
    /// Valid from: `Connecting`.
    pub fn complete_registration(&mut self) -> Result<(), WorkbenchError> {
        match self {
            Self::Connecting => {
                *self = Self::Registered;
                Ok(())
            }
            _ => Err(WorkbenchError::StateViolation(
                "cannot register: not in Connecting state",
            )),
        }
    }

    /// Transition to `Streaming` once subscriptions are resynced.
    ///
    /// Valid from: `Registered`.
    pub fn begin_streaming(&mut self) -> Result<(), WorkbenchError> {
        match self {
            Self::Registered => {
                *self = Self::Streaming {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(WorkbenchError::StateViolation(
                "cannot stream: not in Registered state",
            )),
        }
    }

    /// Reset to `Disconnected` regardless of current state.
    ///
    /// Any I/O failure, peer close, or explicit stop lands here.
    pub fn force_disconnect(&mut self) {
        *self = Self::Disconnected;
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_lifecycle() {
        let mut phase = LinkPhase::Disconnected;

        phase.begin_connect().unwrap();
        assert_eq!(phase, LinkPhase::Connecting);

        phase.complete_registration().unwrap();
        assert_eq!(phase, LinkPhase::Registered);

        phase.begin_streaming().unwrap();
        assert!(phase.is_streaming());
        assert!(phase.streaming_duration().is_some());

        phase.force_disconnect();
        assert!(phase.is_disconnected());
    }

    #[test]
    fn invalid_transition_connect_while_streaming() {
        let mut phase = LinkPhase::Streaming {
            since: Instant::now(),
        };
        assert!(phase.begin_connect().is_err());
    }

    #[test]
    fn invalid_transition_register_from_disconnected() {
        let mut phase = LinkPhase::Disconnected;
        assert!(phase.complete_registration().is_err());
    }

    #[test]
    fn invalid_transition_stream_from_connecting() {
        let mut phase = LinkPhase::Connecting;
        assert!(phase.begin_streaming().is_err());
    }

    #[test]
    fn force_disconnect_from_any_state() {
        for mut phase in [
            LinkPhase::Connecting,
            LinkPhase::Registered,
            LinkPhase::Streaming {
                since: Instant::now(),
            },
        ] {
            phase.force_disconnect();
            assert!(phase.is_disconnected());
        }
    }

    #[test]
    fn streaming_duration_absent_elsewhere() {
        assert!(LinkPhase::Disconnected.streaming_duration().is_none());
        assert!(LinkPhase::Registered.streaming_duration().is_none());
    }

    #[test]
    fn display_format() {
        assert_eq!(LinkPhase::Disconnected.to_string(), "Disconnected");
        assert_eq!(LinkPhase::Connecting.to_string(), "Connecting");
        assert_eq!(LinkPhase::Registered.to_string(), "Registered");
        assert_eq!(
            LinkPhase::Streaming {
                since: Instant::now()
            }
            .to_string(),
            "Streaming"
        );
    }

    #[test]
    fn default_phase_is_disconnected() {
        assert!(LinkPhase::default().is_disconnected());
    }
}
