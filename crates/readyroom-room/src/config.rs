//! Room configuration and match phase.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration for a room instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Maximum roster size, host included. Connections beyond it are
    /// turned away before they can identify.
    pub capacity: usize,

    /// Refuse to start the match until every roster entry is ready.
    /// Off by default: the host decides when to start.
    pub require_all_ready: bool,

    /// Command channel size of the room actor. Senders wait when full.
    pub channel_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            capacity: 2,
            require_all_ready: false,
            channel_size: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// MatchPhase
// ---------------------------------------------------------------------------

/// Where a room is in its match lifecycle.
///
/// ```text
/// Open ⇄ Started
/// ```
///
/// - **Open**: players join, leave and toggle readiness.
/// - **Started**: the host started the match. The host can cancel or
///   exit it, which returns the room to Open with the roster intact.
///
/// There's no terminal phase; a room ends when its host shuts it down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchPhase {
    #[default]
    Open,
    Started,
}

impl MatchPhase {
    pub fn is_started(self) -> bool {
        matches!(self, Self::Started)
    }

    /// Returns `true` if moving to `target` is a real transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        self != target
    }
}

impl std::fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Started => write!(f, "Started"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_phase_transitions() {
        assert!(MatchPhase::Open.can_transition_to(MatchPhase::Started));
        assert!(MatchPhase::Started.can_transition_to(MatchPhase::Open));
        assert!(!MatchPhase::Started.can_transition_to(MatchPhase::Started));
        assert!(!MatchPhase::Open.can_transition_to(MatchPhase::Open));
    }

    #[test]
    fn test_match_phase_default_is_open() {
        assert_eq!(MatchPhase::default(), MatchPhase::Open);
        assert!(!MatchPhase::Open.is_started());
    }

    #[test]
    fn test_match_phase_display() {
        assert_eq!(MatchPhase::Open.to_string(), "Open");
        assert_eq!(MatchPhase::Started.to_string(), "Started");
    }

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.capacity, 2);
        assert!(!config.require_all_ready);
        assert_eq!(config.channel_size, 64);
    }

    #[test]
    fn test_room_config_partial_json_uses_defaults() {
        let config: RoomConfig = serde_json::from_str(r#"{"capacity": 4}"#).unwrap();
        assert_eq!(config.capacity, 4);
        assert_eq!(config.channel_size, 64);
    }
}
