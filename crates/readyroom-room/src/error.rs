//! Error types for the room layer.

use readyroom_protocol::{PeerId, SessionId};

use crate::{MatchPhase, RoomId};

/// Errors that can occur during room operations.
///
/// Every rejection happens before any state changes: an operation that
/// returns one of these left the room exactly as it was.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No free slot for another player.
    #[error("room is full ({capacity} players)")]
    RoomFull { capacity: usize },

    /// The caller lacks host authority for this operation.
    #[error("not authorized to {0}")]
    NotAuthorized(&'static str),

    /// The identity payload didn't parse.
    #[error("malformed identity: {0}")]
    MalformedIdentity(String),

    /// The peer is already connected or already on the roster.
    #[error("{0} is already in the room")]
    AlreadyInRoom(PeerId),

    /// The peer has no live connection to this room.
    #[error("{0} is not connected")]
    NotConnected(PeerId),

    /// The match is in a phase that doesn't allow this operation,
    /// e.g. starting a match that already started.
    #[error("operation not allowed while match is {0}")]
    InvalidPhase(MatchPhase),

    /// Starting requires every player to be ready.
    #[error("not every player is ready")]
    NotAllReady,

    /// The room is already linked to a directory session. Players
    /// registered there would otherwise be unregistered against the
    /// wrong session.
    #[error("room already belongs to session {0}")]
    SessionAlreadyAssigned(SessionId),

    /// This context already runs a room.
    #[error("{0} is already active")]
    AlreadyActive(RoomId),

    /// A replication update didn't fit the local replica.
    #[error("replica out of sync: {0}")]
    Desync(String),

    /// The room's command channel is closed.
    #[error("{0} is unavailable")]
    Unavailable(RoomId),
}
