//! Error types for the directory layer.

use readyroom_protocol::{SessionId, UserId};

/// Errors a session directory can report.
///
/// Callers treat every one of these as non-fatal: user-initiated calls
/// surface them, background registration just logs them.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// No session with this id.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The session is private and no password was given.
    #[error("session {0} is private and requires a password")]
    PasswordRequired(SessionId),

    /// The password didn't match.
    #[error("wrong password for session {0}")]
    WrongPassword(SessionId),

    /// Every player slot is taken.
    #[error("session {0} is full")]
    SessionFull(SessionId),

    /// The user isn't on the session's player list.
    #[error("user {0} is not registered to session {1}")]
    NotRegistered(UserId, SessionId),

    /// The settings can't describe a valid session.
    #[error("invalid session settings: {0}")]
    InvalidSettings(String),

    /// The backend failed for a reason of its own.
    #[error("directory backend error: {0}")]
    Backend(String),
}
