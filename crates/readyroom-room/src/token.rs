//! Room identity and the host's authority over it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::RoomError;

static NEXT_ROOM_ID: AtomicU64 = AtomicU64::new(1);

/// Process-local identifier of a hosted room.
///
/// Allocated when a room opens and never handed out twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(pub(crate) u64);

impl RoomId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ROOM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room-{}", self.0)
    }
}

/// Proof of host authority over one room.
///
/// Only [`RoomMembershipEngine::open`](crate::RoomMembershipEngine::open)
/// mints tokens, and only one per room. Host-only operations take a
/// `&HostToken` and refuse tokens minted for another room. Not `Clone`.
#[derive(Debug)]
pub struct HostToken {
    room_id: RoomId,
}

impl HostToken {
    pub(crate) fn issue(room_id: RoomId) -> Self {
        Self { room_id }
    }

    /// The room this token is good for.
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub(crate) fn authorize(
        &self,
        room_id: RoomId,
        operation: &'static str,
    ) -> Result<(), RoomError> {
        if self.room_id == room_id {
            Ok(())
        } else {
            tracing::warn!(
                token_room = %self.room_id,
                %room_id,
                operation,
                "host token for another room"
            );
            Err(RoomError::NotAuthorized(operation))
        }
    }
}
