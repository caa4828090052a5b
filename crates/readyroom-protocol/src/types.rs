//! Identity types shared by the host, its peers, and the session directory.

use std::fmt;

use readyroom_transport::ConnectionId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PeerId
// ---------------------------------------------------------------------------

/// Transport-level identifier of a room participant.
///
/// The host is always [`PeerId::HOST`]; every other peer gets the id of
/// the connection it arrived on. Connection ids start at 1 and are never
/// reused, so neither are peer ids.
///
/// Serializes as a plain number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PeerId(pub u64);

impl PeerId {
    /// The authoritative host's own id.
    pub const HOST: PeerId = PeerId(0);

    /// Returns `true` if this is the host's id.
    pub fn is_host(self) -> bool {
        self == Self::HOST
    }
}

impl From<ConnectionId> for PeerId {
    fn from(id: ConnectionId) -> Self {
        PeerId(id.into_inner())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_host() {
            write!(f, "peer-host")
        } else {
            write!(f, "peer-{}", self.0)
        }
    }
}

// ---------------------------------------------------------------------------
// UserId / SessionId
// ---------------------------------------------------------------------------

/// Opaque account identifier issued by the session directory.
///
/// Stable per account, unlike [`PeerId`] which changes per connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a session record in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// PlayerInfo
// ---------------------------------------------------------------------------

/// One roster entry: a connected participant and whether they're ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    /// The connection this player is on. Join key of the roster.
    pub peer_id: PeerId,
    /// The player's directory account.
    pub user_id: UserId,
    /// Label shown in room slots.
    pub display_name: String,
    /// Consent to start the match. Always `false` on join.
    pub is_ready: bool,
}

impl PlayerInfo {
    /// Creates a not-ready entry.
    pub fn new(
        peer_id: PeerId,
        user_id: UserId,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            peer_id,
            user_id,
            display_name: display_name.into(),
            is_ready: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who a replication update is addressed to.
///
/// Only identified peers ever receive updates; the host applies its own
/// changes locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every identified peer.
    All,
    /// One specific peer.
    Peer(PeerId),
    /// Every identified peer except one.
    AllExcept(PeerId),
}

impl Recipient {
    /// Returns `true` if `peer` is covered by this recipient.
    pub fn includes(self, peer: PeerId) -> bool {
        match self {
            Recipient::All => true,
            Recipient::Peer(p) => p == peer,
            Recipient::AllExcept(p) => p != peer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&PeerId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_peer_id_display() {
        assert_eq!(PeerId(7).to_string(), "peer-7");
        assert_eq!(PeerId::HOST.to_string(), "peer-host");
    }

    #[test]
    fn test_peer_id_from_connection_id() {
        let peer: PeerId = ConnectionId::new(9).into();
        assert_eq!(peer, PeerId(9));
        assert!(!peer.is_host());
    }

    #[test]
    fn test_user_and_session_ids_serialize_as_plain_strings() {
        assert_eq!(serde_json::to_string(&UserId::new("u-1")).unwrap(), "\"u-1\"");
        assert_eq!(
            serde_json::to_string(&SessionId::new("abc")).unwrap(),
            "\"abc\""
        );
    }

    #[test]
    fn test_player_info_new_is_not_ready() {
        let p = PlayerInfo::new(PeerId(1), UserId::new("u"), "Ann");
        assert!(!p.is_ready);
        assert_eq!(p.display_name, "Ann");
    }

    #[test]
    fn test_recipient_includes() {
        assert!(Recipient::All.includes(PeerId(3)));
        assert!(Recipient::Peer(PeerId(3)).includes(PeerId(3)));
        assert!(!Recipient::Peer(PeerId(3)).includes(PeerId(4)));
        assert!(!Recipient::AllExcept(PeerId(3)).includes(PeerId(3)));
        assert!(Recipient::AllExcept(PeerId(3)).includes(PeerId(4)));
    }
}
