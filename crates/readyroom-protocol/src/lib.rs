//! Wire protocol for readyroom.
//!
//! This crate defines what travels between a room's host and its peers:
//!
//! - **Identity types** ([`PeerId`], [`UserId`], [`SessionId`],
//!   [`PlayerInfo`]): who is in a room.
//! - **Identity message** ([`Identity`]): the `"<userId>:<displayName>"`
//!   text a peer sends once per connection.
//! - **Messages** ([`Envelope`], [`SystemMessage`], [`NamedMessage`],
//!   [`Replication`]): connection plumbing, peer requests, and host →
//!   peer state replication.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes in, bytes out.
//!
//! The protocol layer knows nothing about rooms or sockets; it only
//! describes and (de)serializes messages.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Room (roster, match state)
//! ```

mod codec;
mod error;
mod identity;
mod message;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use identity::{Identity, MAX_FIELD_BYTES};
pub use message::{
    Envelope, NamedMessage, Payload, Replication, RoomRequest, RosterChange,
    SystemMessage, PROTOCOL_VERSION,
};
pub use types::{PeerId, PlayerInfo, Recipient, SessionId, UserId};
