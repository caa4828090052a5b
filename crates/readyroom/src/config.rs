//! Lobby configuration.

use std::time::Duration;

use readyroom_room::RoomConfig;
use serde::{Deserialize, Serialize};

use crate::ReadyroomError;

/// Settings for one player's lobby context.
///
/// Every field has a default, so a config file only needs the fields it
/// changes:
///
/// ```rust
/// use readyroom::LobbyConfig;
///
/// let config = LobbyConfig::from_json(r#"{ "map_name": "canyon" }"#).unwrap();
/// assert_eq!(config.map_name, "canyon");
/// assert_eq!(config.game_mode, "1vs1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    /// Where a host listens for peers. Port 0 picks a free port.
    pub bind_addr: String,

    /// Mode tag published with hosted sessions and used to filter
    /// browsing.
    pub game_mode: String,

    pub map_name: String,

    /// Published in the session settings so mismatched builds can tell.
    pub game_version: String,

    /// How long a peer may take to identify after connecting.
    pub identity_timeout_ms: u64,

    pub room: RoomConfig,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            game_mode: "1vs1".to_string(),
            map_name: "default".to_string(),
            game_version: "1.0.0".to_string(),
            identity_timeout_ms: 5_000,
            room: RoomConfig::default(),
        }
    }
}

impl LobbyConfig {
    /// Parses a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ReadyroomError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn identity_timeout(&self) -> Duration {
        Duration::from_millis(self.identity_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lobby_config() {
        let config = LobbyConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:0");
        assert_eq!(config.game_mode, "1vs1");
        assert_eq!(config.identity_timeout(), Duration::from_secs(5));
        assert_eq!(config.room.capacity, 2);
    }

    #[test]
    fn test_from_json_nested_room_config() {
        let config = LobbyConfig::from_json(
            r#"{ "identity_timeout_ms": 250, "room": { "require_all_ready": true } }"#,
        )
        .unwrap();
        assert_eq!(config.identity_timeout(), Duration::from_millis(250));
        assert!(config.room.require_all_ready);
        assert_eq!(config.room.capacity, 2);
    }

    #[test]
    fn test_from_json_invalid_is_config_error() {
        let result = LobbyConfig::from_json("{ not json");
        assert!(matches!(result, Err(ReadyroomError::Config(_))));
    }
}
