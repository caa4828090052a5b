//! Unified error type for readyroom.

use readyroom_directory::DirectoryError;
use readyroom_protocol::ProtocolError;
use readyroom_room::RoomError;
use readyroom_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each wrapped variant lets `?` convert
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ReadyroomError {
    /// A transport-level error (bind, connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, malformed identity).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The session directory refused or failed a request.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// A room-level error (full, not authorized, wrong phase).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The host turned the connection away.
    #[error("rejected by host: {0}")]
    Rejected(String),

    /// The other side broke the connection handshake.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// This context is already hosting or in a session.
    #[error("a session is already active")]
    AlreadyActive,

    /// Configuration couldn't be loaded.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use readyroom_protocol::SessionId;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let err: ReadyroomError = err.into();
        assert!(matches!(err, ReadyroomError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let err: ReadyroomError = err.into();
        assert!(matches!(err, ReadyroomError::Protocol(_)));
    }

    #[test]
    fn test_from_directory_error() {
        let err = DirectoryError::PasswordRequired(SessionId::new("s"));
        let err: ReadyroomError = err.into();
        assert!(matches!(
            err,
            ReadyroomError::Directory(DirectoryError::PasswordRequired(_))
        ));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::NotAllReady;
        let err: ReadyroomError = err.into();
        assert!(matches!(err, ReadyroomError::Room(_)));
    }
}
