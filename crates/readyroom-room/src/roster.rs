//! The ordered list of players in a room.

use readyroom_protocol::{PeerId, PlayerInfo, RosterChange};

use crate::RoomError;

/// Players in join order, at most one entry per peer.
///
/// The same type backs the host's canonical roster and a peer's replica;
/// the host mutates it through operations, the replica through
/// [`apply`](Self::apply).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    entries: Vec<PlayerInfo>,
    capacity: usize,
}

impl Roster {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn entries(&self) -> &[PlayerInfo] {
        &self.entries
    }

    pub fn to_vec(&self) -> Vec<PlayerInfo> {
        self.entries.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerInfo> {
        self.entries.iter()
    }

    pub fn index_of(&self, peer: PeerId) -> Option<usize> {
        self.entries.iter().position(|p| p.peer_id == peer)
    }

    pub fn get(&self, peer: PeerId) -> Option<&PlayerInfo> {
        self.entries.iter().find(|p| p.peer_id == peer)
    }

    pub fn contains(&self, peer: PeerId) -> bool {
        self.index_of(peer).is_some()
    }

    /// `true` when there is at least one entry and all are ready.
    pub fn all_ready(&self) -> bool {
        !self.entries.is_empty() && self.entries.iter().all(|p| p.is_ready)
    }

    /// Appends a player and returns its index.
    pub fn add(&mut self, player: PlayerInfo) -> Result<usize, RoomError> {
        if self.contains(player.peer_id) {
            return Err(RoomError::AlreadyInRoom(player.peer_id));
        }
        if self.is_full() {
            return Err(RoomError::RoomFull {
                capacity: self.capacity,
            });
        }
        self.entries.push(player);
        Ok(self.entries.len() - 1)
    }

    /// Removes a peer's entry, returning where it was.
    pub fn remove(&mut self, peer: PeerId) -> Option<(usize, PlayerInfo)> {
        let index = self.index_of(peer)?;
        Some((index, self.entries.remove(index)))
    }

    /// Flips a peer's ready flag. Returns the index and the updated entry.
    pub fn toggle_ready(&mut self, peer: PeerId) -> Option<(usize, &PlayerInfo)> {
        let index = self.index_of(peer)?;
        let entry = &mut self.entries[index];
        entry.is_ready = !entry.is_ready;
        Some((index, &self.entries[index]))
    }

    /// Clears every ready flag. Returns the indices that changed.
    pub fn reset_ready(&mut self) -> Vec<usize> {
        let mut changed = Vec::new();
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if entry.is_ready {
                entry.is_ready = false;
                changed.push(index);
            }
        }
        changed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Replaces every entry, e.g. from a snapshot.
    pub fn replace(&mut self, entries: Vec<PlayerInfo>) {
        self.entries = entries;
    }

    /// Applies a replicated change.
    ///
    /// Capacity isn't enforced here; the host already did.
    ///
    /// # Errors
    /// [`RoomError::Desync`] if an index is out of range or an `Add`
    /// duplicates a peer. The roster is left untouched.
    pub fn apply(&mut self, change: RosterChange) -> Result<(), RoomError> {
        match change {
            RosterChange::Add { player } => {
                if self.contains(player.peer_id) {
                    return Err(RoomError::Desync(format!(
                        "add of {} already present",
                        player.peer_id
                    )));
                }
                self.entries.push(player);
            }
            RosterChange::RemoveAt { index } => {
                self.check_index(index)?;
                self.entries.remove(index);
            }
            RosterChange::Update { index, player } => {
                self.check_index(index)?;
                self.entries[index] = player;
            }
            RosterChange::Clear => self.entries.clear(),
        }
        Ok(())
    }

    /// One slot per unit of capacity: slot `i` shows entry `i` or is
    /// empty. This is what room UIs render.
    pub fn slots(&self) -> Vec<Option<&PlayerInfo>> {
        let slots = self.capacity.max(self.entries.len());
        (0..slots).map(|i| self.entries.get(i)).collect()
    }

    fn check_index(&self, index: usize) -> Result<(), RoomError> {
        if index < self.entries.len() {
            Ok(())
        } else {
            Err(RoomError::Desync(format!(
                "index {index} out of range for {} entries",
                self.entries.len()
            )))
        }
    }
}
