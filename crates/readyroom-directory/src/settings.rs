//! Session records: what a host publishes and what browsers see.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use readyroom_protocol::{SessionId, UserId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomAccessibility
// ---------------------------------------------------------------------------

/// Whether joining a session needs a password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomAccessibility {
    #[default]
    Public,
    Private,
}

impl RoomAccessibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for RoomAccessibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoomAccessibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            other => Err(format!("unknown room accessibility {other:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionSettings
// ---------------------------------------------------------------------------

/// Settings a host publishes when creating a session.
///
/// `settings` is a free-form blob. Readyroom relies on three keys in it:
/// [`SESSION_NAME`](Self::SESSION_NAME),
/// [`ROOM_ACCESSIBILITY`](Self::ROOM_ACCESSIBILITY) and
/// [`HOST_ADDRESS`](Self::HOST_ADDRESS), the latter being where peers
/// dial the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Game mode tag, e.g. `"1vs1"`.
    pub mode: String,
    pub map_name: String,
    pub max_players: usize,
    pub current_players: usize,
    pub allow_join_in_progress: bool,
    /// Only set for private sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl SessionSettings {
    pub const SESSION_NAME: &'static str = "session_name";
    pub const ROOM_ACCESSIBILITY: &'static str = "room_accessibility";
    pub const HOST_ADDRESS: &'static str = "host_address";

    pub fn session_name(&self) -> Option<&str> {
        self.settings.get(Self::SESSION_NAME).map(String::as_str)
    }

    /// Accessibility from the settings blob. Missing or unknown values
    /// read as public.
    pub fn accessibility(&self) -> RoomAccessibility {
        self.settings
            .get(Self::ROOM_ACCESSIBILITY)
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    pub fn host_address(&self) -> Option<&str> {
        self.settings.get(Self::HOST_ADDRESS).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// SessionSummary
// ---------------------------------------------------------------------------

/// A session as seen by someone browsing the directory.
///
/// The password never leaves the directory: `settings.password` is
/// always `None` here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub host_user_id: UserId,
    pub settings: SessionSettings,
    /// Registered players, host included.
    pub players: Vec<UserId>,
}

impl SessionSummary {
    pub fn session_name(&self) -> Option<&str> {
        self.settings.session_name()
    }

    pub fn accessibility(&self) -> RoomAccessibility {
        self.settings.accessibility()
    }

    pub fn host_address(&self) -> Option<&str> {
        self.settings.host_address()
    }

    /// `true` once every slot is taken. Browsers disable joining then.
    pub fn is_full(&self) -> bool {
        self.players.len() >= self.settings.max_players
    }

    /// `"<current>/<max>"`, e.g. `"1/2"`.
    pub fn capacity_label(&self) -> String {
        format!("{}/{}", self.players.len(), self.settings.max_players)
    }
}

// ---------------------------------------------------------------------------
// SessionFilter
// ---------------------------------------------------------------------------

/// Narrows a [`list`](crate::DirectoryClient::list) query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    /// Only sessions with this mode tag.
    pub mode: Option<String>,
    /// Hide sessions with no free slot.
    pub joinable_only: bool,
}

impl SessionFilter {
    /// Matches every session.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: impl Into<String>) -> Self {
        Self {
            mode: Some(mode.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, summary: &SessionSummary) -> bool {
        if let Some(mode) = &self.mode {
            if summary.settings.mode != *mode {
                return false;
            }
        }
        !(self.joinable_only && summary.is_full())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(blob: &[(&str, &str)]) -> SessionSettings {
        SessionSettings {
            mode: "1vs1".into(),
            map_name: "default".into(),
            max_players: 2,
            current_players: 1,
            allow_join_in_progress: true,
            password: None,
            settings: blob
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn summary(players: usize) -> SessionSummary {
        SessionSummary {
            session_id: SessionId::new("s"),
            host_user_id: UserId::new("h"),
            settings: settings(&[]),
            players: (0..players).map(|i| UserId::new(format!("u{i}"))).collect(),
        }
    }

    #[test]
    fn test_accessibility_reads_blob() {
        let s = settings(&[("room_accessibility", "private")]);
        assert_eq!(s.accessibility(), RoomAccessibility::Private);
    }

    #[test]
    fn test_accessibility_missing_or_unknown_is_public() {
        assert_eq!(settings(&[]).accessibility(), RoomAccessibility::Public);
        let s = settings(&[("room_accessibility", "secret")]);
        assert_eq!(s.accessibility(), RoomAccessibility::Public);
    }

    #[test]
    fn test_session_name_and_host_address() {
        let s = settings(&[("session_name", "Friday duel"), ("host_address", "10.0.0.2:7000")]);
        assert_eq!(s.session_name(), Some("Friday duel"));
        assert_eq!(s.host_address(), Some("10.0.0.2:7000"));
    }

    #[test]
    fn test_capacity_label_and_full() {
        assert_eq!(summary(1).capacity_label(), "1/2");
        assert!(!summary(1).is_full());
        assert!(summary(2).is_full());
    }

    #[test]
    fn test_filter_by_mode_and_joinable() {
        let open = summary(1);
        let full = summary(2);
        assert!(SessionFilter::any().matches(&full));
        assert!(SessionFilter::with_mode("1vs1").matches(&open));
        assert!(!SessionFilter::with_mode("2vs2").matches(&open));

        let joinable = SessionFilter {
            joinable_only: true,
            ..SessionFilter::any()
        };
        assert!(joinable.matches(&open));
        assert!(!joinable.matches(&full));
    }

    #[test]
    fn test_settings_omit_missing_password_in_json() {
        let json = serde_json::to_value(settings(&[])).unwrap();
        assert!(json.get("password").is_none());
    }

    #[test]
    fn test_accessibility_serializes_lowercase() {
        let json = serde_json::to_string(&RoomAccessibility::Private).unwrap();
        assert_eq!(json, "\"private\"");
    }
}
