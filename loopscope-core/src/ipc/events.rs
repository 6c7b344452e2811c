//! Event types emitted by the engine.
//!
//! | Event | Source |
//! |-------|--------|
//! | `PlaybackStatusEvent` | `AudioEngine::subscribe_status()` |

use serde::{Deserialize, Serialize};

use crate::engine::PlaybackState;

/// Emitted whenever playback starts, stops or fails to start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStatusEvent {
    pub status: PlaybackStatus,
    /// Optional human-readable detail (e.g. device name or error message).
    pub detail: Option<String>,
}

/// Externally visible playback status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    /// Loop is rendering to the output.
    Running,
    /// Output released; the engine may be restarted.
    Stopped,
    /// `start()` failed; the engine stayed stopped.
    Error,
}

impl From<PlaybackState> for PlaybackStatus {
    fn from(state: PlaybackState) -> Self {
        match state {
            PlaybackState::Running => PlaybackStatus::Running,
            PlaybackState::Stopped => PlaybackStatus::Stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_event_serializes_with_lowercase_status() {
        let event = PlaybackStatusEvent {
            status: PlaybackStatus::Running,
            detail: Some("manual".into()),
        };

        let json = serde_json::to_value(&event).expect("serialize status event");
        assert_eq!(json["status"], "running");
        assert_eq!(json["detail"], "manual");

        let round_trip: PlaybackStatusEvent =
            serde_json::from_value(json).expect("deserialize status event");
        assert_eq!(round_trip.status, PlaybackStatus::Running);
        assert_eq!(round_trip.detail.as_deref(), Some("manual"));
    }

    #[test]
    fn status_rejects_non_lowercase_values() {
        let err = serde_json::from_str::<PlaybackStatus>(r#""Stopped""#);
        assert!(err.is_err(), "expected invalid casing to fail");
    }

    #[test]
    fn playback_state_maps_to_status() {
        assert_eq!(
            PlaybackStatus::from(PlaybackState::Stopped),
            PlaybackStatus::Stopped
        );
        assert_eq!(
            PlaybackStatus::from(PlaybackState::Running),
            PlaybackStatus::Running
        );
    }
}
