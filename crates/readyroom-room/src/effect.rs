//! Side effects the room core asks its driver to perform.

use readyroom_protocol::{PeerId, Recipient, Replication, SessionId, UserId};

use crate::RegistrationTicket;

/// One thing the driver must do after a core operation.
///
/// Effects come back in order and must be carried out in order: a
/// start yields `MatchStarted` before the roster resets, and peers see
/// them in that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEffect {
    /// Replicate an update to identified peers.
    Send(Recipient, Replication),

    /// Add a player to the directory session. Report the outcome back
    /// with the ticket.
    Register {
        peer: PeerId,
        session_id: SessionId,
        user_id: UserId,
        ticket: RegistrationTicket,
    },

    /// Remove a player from the directory session. Fire and forget.
    Unregister {
        session_id: SessionId,
        user_id: UserId,
    },

    /// Tell a peer to go away and close its connection.
    Disconnect { peer: PeerId, reason: String },
}
