//! Room manager: the one active hosted room of a context.

use std::sync::Arc;

use readyroom_directory::DirectoryClient;
use readyroom_protocol::PlayerInfo;

use crate::room::spawn_room;
use crate::{RoomConfig, RoomError, RoomHandle};

/// Owns at most one live room.
///
/// Opening a second room while the first still runs is an error rather
/// than a silent replacement. A room whose actor has stopped no longer
/// counts as live.
#[derive(Default)]
pub struct RoomManager {
    active: Option<RoomHandle>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a room hosted by `host` and returns its handle.
    ///
    /// # Errors
    /// [`RoomError::AlreadyActive`] if a room is still live.
    pub fn open<D: DirectoryClient>(
        &mut self,
        config: &RoomConfig,
        host: PlayerInfo,
        directory: Arc<D>,
    ) -> Result<RoomHandle, RoomError> {
        if let Some(active) = &self.active {
            if !active.is_closed() {
                return Err(RoomError::AlreadyActive(active.room_id()));
            }
        }

        let handle = spawn_room(config, host, directory);
        let room_id = handle.room_id();
        tracing::info!(%room_id, capacity = config.capacity, "room opened");
        self.active = Some(handle.clone());
        Ok(handle)
    }

    /// The live room, if any.
    pub fn active(&self) -> Option<&RoomHandle> {
        self.active.as_ref().filter(|h| !h.is_closed())
    }

    /// Shuts the live room down. No room is a no-op.
    pub async fn close(&mut self, reason: &str) -> Result<(), RoomError> {
        let Some(handle) = self.active.take() else {
            return Ok(());
        };
        if handle.is_closed() {
            return Ok(());
        }
        let room_id = handle.room_id();
        handle.shutdown(reason).await?;
        tracing::info!(%room_id, "room closed");
        Ok(())
    }
}
