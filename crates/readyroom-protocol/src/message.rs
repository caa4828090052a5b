//! Messages exchanged between a room's host and its peers.
//!
//! Three kinds of payload share one [`Envelope`]:
//!
//! - [`SystemMessage`]: connection plumbing (hello, welcome, rejection,
//!   disconnect, errors).
//! - [`NamedMessage`]: peer → host requests, addressed by name the way
//!   a replicated channel's named-message handlers are.
//! - [`Replication`]: host → peer updates of the shared room state.

use serde::{Deserialize, Serialize};

use crate::{PeerId, PlayerInfo, SessionId};

/// The current protocol version. Peers must send this in their `Hello`
/// or be turned away.
pub const PROTOCOL_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// SystemMessage
// ---------------------------------------------------------------------------

/// Framework-level messages.
///
/// Internally tagged: `{ "type": "Welcome", "peer_id": 3, "host_id": 0 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    /// Peer → Host: first message on every connection.
    Hello { version: u32 },

    /// Host → Peer: the connection was admitted. `peer_id` is the id the
    /// host will know this peer by.
    Welcome { peer_id: PeerId, host_id: PeerId },

    /// Host → Peer: the connection was refused (room full). The host
    /// closes the connection right after.
    Rejected { reason: String },

    /// Either direction: "I'm going away." Sent by the host to every peer
    /// when it shuts the room down.
    Disconnect { reason: String },

    /// Host → Peer: a request failed. HTTP-style codes (400 bad request,
    /// 403 not allowed, 409 conflict).
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// NamedMessage / RoomRequest
// ---------------------------------------------------------------------------

/// A message addressed to a named handler on the receiving side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedMessage {
    pub name: String,
    #[serde(default)]
    pub body: String,
}

impl NamedMessage {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }
}

/// The requests a peer can make of the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomRequest {
    /// Identity announcement; the body is the raw
    /// `"<userId>:<displayName>"` payload, validated by the host.
    Register(String),
    /// Flip the sender's ready flag.
    ToggleReady,
    /// Ask to start the match. Only honoured for the host.
    StartMatch,
}

impl RoomRequest {
    pub const REGISTER: &'static str = "Register";
    pub const TOGGLE_READY: &'static str = "ToggleReady";
    pub const START_MATCH: &'static str = "StartMatch";

    /// Maps a named message to a request. Unknown names yield `None`.
    pub fn from_named(msg: NamedMessage) -> Option<Self> {
        match msg.name.as_str() {
            Self::REGISTER => Some(Self::Register(msg.body)),
            Self::TOGGLE_READY => Some(Self::ToggleReady),
            Self::START_MATCH => Some(Self::StartMatch),
            _ => None,
        }
    }

    /// The handler name this request is sent under.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Register(_) => Self::REGISTER,
            Self::ToggleReady => Self::TOGGLE_READY,
            Self::StartMatch => Self::START_MATCH,
        }
    }
}

impl From<RoomRequest> for NamedMessage {
    fn from(req: RoomRequest) -> Self {
        let name = req.name();
        match req {
            RoomRequest::Register(body) => NamedMessage::new(name, body),
            _ => NamedMessage::new(name, String::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Replication
// ---------------------------------------------------------------------------

/// One change to a replicated roster list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum RosterChange {
    /// Append a player at the end.
    Add { player: PlayerInfo },
    /// Remove the entry at `index`.
    RemoveAt { index: usize },
    /// Replace the entry at `index`.
    Update { index: usize, player: PlayerInfo },
    /// Empty the list.
    Clear,
}

/// Host → Peer update of the shared room state.
///
/// Updates arrive in the order the host issued them. Two updates produced
/// by one host operation are still two updates: a peer may render the
/// first before the second lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Replication {
    /// The whole room, sent to a peer when its identity is accepted.
    Snapshot {
        roster: Vec<PlayerInfo>,
        match_started: bool,
        session_id: Option<SessionId>,
    },
    /// A single roster list change.
    Roster { change: RosterChange },
    /// The shared `match_started` flag changed.
    MatchStarted { value: bool },
    /// The room was linked to a directory session.
    SessionAssigned { session_id: SessionId },
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// What's inside an envelope.
///
/// Adjacently tagged: `{ "type": "Named", "data": { "name": ..., "body": ... } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    System(SystemMessage),
    Named(NamedMessage),
    Replicate(Replication),
}

/// Every message on the wire is an `Envelope`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-sender sequence number, starting at 0.
    pub seq: u64,
    /// Milliseconds since the sender's connection started.
    pub timestamp: u64,
    pub payload: Payload,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UserId;

    #[test]
    fn test_system_message_welcome_json_format() {
        let msg = SystemMessage::Welcome {
            peer_id: PeerId(3),
            host_id: PeerId::HOST,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "Welcome");
        assert_eq!(json["peer_id"], 3);
        assert_eq!(json["host_id"], 0);
    }

    #[test]
    fn test_payload_named_json_format() {
        let payload = Payload::Named(RoomRequest::ToggleReady.into());
        let json: serde_json::Value = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "Named");
        assert_eq!(json["data"]["name"], "ToggleReady");
    }

    #[test]
    fn test_named_message_body_defaults_when_missing() {
        let msg: NamedMessage = serde_json::from_str(r#"{"name":"StartMatch"}"#).unwrap();
        assert_eq!(msg.body, "");
        assert_eq!(RoomRequest::from_named(msg), Some(RoomRequest::StartMatch));
    }

    #[test]
    fn test_room_request_register_carries_body() {
        let named: NamedMessage = RoomRequest::Register("u:Ann".into()).into();
        assert_eq!(named.name, "Register");
        assert_eq!(named.body, "u:Ann");
        assert_eq!(
            RoomRequest::from_named(named),
            Some(RoomRequest::Register("u:Ann".into()))
        );
    }

    #[test]
    fn test_room_request_unknown_name_is_none() {
        let named = NamedMessage::new("Teleport", "");
        assert_eq!(RoomRequest::from_named(named), None);
    }

    #[test]
    fn test_roster_change_json_format() {
        let change = RosterChange::Update {
            index: 1,
            player: PlayerInfo::new(PeerId(2), UserId::new("u2"), "Bo"),
        };
        let json: serde_json::Value = serde_json::to_value(&change).unwrap();
        assert_eq!(json["op"], "Update");
        assert_eq!(json["index"], 1);
        assert_eq!(json["player"]["display_name"], "Bo");
        assert_eq!(json["player"]["is_ready"], false);
    }

    #[test]
    fn test_replication_snapshot_without_session() {
        let rep = Replication::Snapshot {
            roster: vec![],
            match_started: false,
            session_id: None,
        };
        let json: serde_json::Value = serde_json::to_value(&rep).unwrap();
        assert_eq!(json["type"], "Snapshot");
        assert!(json["session_id"].is_null());
    }

    #[test]
    fn test_envelope_round_trip() {
        let envelope = Envelope {
            seq: 7,
            timestamp: 1500,
            payload: Payload::Replicate(Replication::MatchStarted { value: true }),
        };
        let bytes = serde_json::to_vec(&envelope).unwrap();
        let decoded: Envelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(envelope, decoded);
    }

    #[test]
    fn test_decode_unknown_system_message_type_returns_error() {
        let unknown = r#"{"type": "FlyToMoon", "speed": 9000}"#;
        let result: Result<SystemMessage, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }
}
