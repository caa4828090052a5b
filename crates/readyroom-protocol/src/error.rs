//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields, or an
    /// unknown message tag.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The identity payload isn't `"<userId>:<displayName>"`.
    #[error("malformed identity payload: {0}")]
    MalformedIdentity(String),

    /// The message is invalid at the protocol level: it decoded fine
    /// but breaks a protocol rule (wrong version, wrong first message).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
