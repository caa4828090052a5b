//! A read-only view of a room, kept current by replication updates.
//!
//! Peers hold one per joined room. The host keeps one too, fed with
//! snapshots of its own engine, so host and peer UIs observe a room the
//! same way.

use readyroom_protocol::{PlayerInfo, Replication, SessionId};
use tokio::sync::{broadcast, watch};

use crate::{RoomError, Roster};

/// Capacity of the event broadcast. Slow observers past this lag and
/// skip ahead; [`RoomReplica::watch`] always has the latest state.
const EVENT_BUFFER: usize = 64;

/// The room as an observer sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub roster: Vec<PlayerInfo>,
    pub match_started: bool,
    pub session_id: Option<SessionId>,
}

impl RoomSnapshot {
    pub fn player(&self, peer: readyroom_protocol::PeerId) -> Option<&PlayerInfo> {
        self.roster.iter().find(|p| p.peer_id == peer)
    }

    /// `capacity` positional slots; slot `i` is roster entry `i` or empty.
    pub fn slots(&self, capacity: usize) -> Vec<Option<&PlayerInfo>> {
        (0..capacity.max(self.roster.len()))
            .map(|i| self.roster.get(i))
            .collect()
    }
}

/// Something observers of a room may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// The roster changed. Carries the whole new roster.
    RosterChanged(Vec<PlayerInfo>),
    MatchStartedChanged { old: bool, new: bool },
    SessionAssigned(SessionId),
    /// The host is gone. The replica is empty now.
    Closed,
}

/// A replicated room.
///
/// Observers subscribe with [`subscribe`](Self::subscribe); dropping the
/// receiver unsubscribes.
pub struct RoomReplica {
    roster: Roster,
    match_started: bool,
    session_id: Option<SessionId>,
    events: broadcast::Sender<RoomEvent>,
    state: watch::Sender<RoomSnapshot>,
}

impl RoomReplica {
    /// Creates an empty replica. `capacity` only affects [`slots`](Self::slots).
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (state, _) = watch::channel(RoomSnapshot::default());
        Self {
            roster: Roster::new(capacity),
            match_started: false,
            session_id: None,
            events,
            state,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn match_started(&self) -> bool {
        self.match_started
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn slots(&self) -> Vec<Option<&PlayerInfo>> {
        self.roster.slots()
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            roster: self.roster.to_vec(),
            match_started: self.match_started,
            session_id: self.session_id.clone(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }

    /// Latest state, without history.
    pub fn watch(&self) -> watch::Receiver<RoomSnapshot> {
        self.state.subscribe()
    }

    /// A sender for this replica's events, so observers can still
    /// subscribe after the replica moved into another task.
    pub fn event_sender(&self) -> broadcast::Sender<RoomEvent> {
        self.events.clone()
    }

    /// Applies one update from the host.
    ///
    /// A snapshot replaces everything and only reports what actually
    /// differs.
    ///
    /// # Errors
    /// [`RoomError::Desync`] if a roster change doesn't fit. The replica
    /// is unchanged; the host's next snapshot will repair it.
    pub fn apply(&mut self, update: Replication) -> Result<(), RoomError> {
        match update {
            Replication::Snapshot {
                roster,
                match_started,
                session_id,
            } => {
                if self.roster.entries() != roster.as_slice() {
                    self.roster.replace(roster);
                    self.emit(RoomEvent::RosterChanged(self.roster.to_vec()));
                }
                self.set_match_started(match_started);
                if let Some(session_id) = session_id {
                    self.set_session_id(session_id);
                }
            }
            Replication::Roster { change } => {
                self.roster.apply(change)?;
                self.emit(RoomEvent::RosterChanged(self.roster.to_vec()));
            }
            Replication::MatchStarted { value } => self.set_match_started(value),
            Replication::SessionAssigned { session_id } => self.set_session_id(session_id),
        }
        self.publish_state();
        Ok(())
    }

    /// The host went away: empty the roster, reset the match flag, and
    /// tell observers the room is closed.
    pub fn on_host_lost(&mut self) {
        if !self.roster.is_empty() {
            self.roster.clear();
            self.emit(RoomEvent::RosterChanged(Vec::new()));
        }
        self.set_match_started(false);
        self.session_id = None;
        self.publish_state();
        self.emit(RoomEvent::Closed);
    }

    fn set_match_started(&mut self, value: bool) {
        if self.match_started != value {
            let old = self.match_started;
            self.match_started = value;
            self.emit(RoomEvent::MatchStartedChanged { old, new: value });
        }
    }

    fn set_session_id(&mut self, session_id: SessionId) {
        if self.session_id.as_ref() != Some(&session_id) {
            self.session_id = Some(session_id.clone());
            self.emit(RoomEvent::SessionAssigned(session_id));
        }
    }

    fn emit(&self, event: RoomEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn publish_state(&self) {
        self.state.send_replace(self.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use readyroom_protocol::{PeerId, RosterChange, UserId};

    use super::*;

    fn player(id: u64, ready: bool) -> PlayerInfo {
        let mut p = PlayerInfo::new(PeerId(id), UserId::new(format!("u{id}")), "P");
        p.is_ready = ready;
        p
    }

    fn drain(rx: &mut broadcast::Receiver<RoomEvent>) -> Vec<RoomEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_apply_snapshot_reports_changes() {
        let mut replica = RoomReplica::new(2);
        let mut rx = replica.subscribe();

        replica
            .apply(Replication::Snapshot {
                roster: vec![player(0, false), player(1, false)],
                match_started: true,
                session_id: Some(SessionId::new("s")),
            })
            .unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![
                RoomEvent::RosterChanged(vec![player(0, false), player(1, false)]),
                RoomEvent::MatchStartedChanged { old: false, new: true },
                RoomEvent::SessionAssigned(SessionId::new("s")),
            ]
        );
    }

    #[test]
    fn test_apply_same_snapshot_twice_is_quiet() {
        let mut replica = RoomReplica::new(2);
        let snapshot = Replication::Snapshot {
            roster: vec![player(0, false)],
            match_started: false,
            session_id: None,
        };
        replica.apply(snapshot.clone()).unwrap();
        let mut rx = replica.subscribe();
        replica.apply(snapshot).unwrap();
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_apply_roster_change_updates_watch() {
        let mut replica = RoomReplica::new(2);
        let watch = replica.watch();
        replica
            .apply(Replication::Roster {
                change: RosterChange::Add { player: player(3, true) },
            })
            .unwrap();
        assert_eq!(watch.borrow().roster, vec![player(3, true)]);
    }

    #[test]
    fn test_apply_bad_index_is_desync() {
        let mut replica = RoomReplica::new(2);
        let result = replica.apply(Replication::Roster {
            change: RosterChange::RemoveAt { index: 0 },
        });
        assert!(matches!(result, Err(RoomError::Desync(_))));
    }

    #[test]
    fn test_match_started_change_reports_old_and_new() {
        let mut replica = RoomReplica::new(2);
        let mut rx = replica.subscribe();
        replica.apply(Replication::MatchStarted { value: true }).unwrap();
        replica.apply(Replication::MatchStarted { value: true }).unwrap();
        replica.apply(Replication::MatchStarted { value: false }).unwrap();
        assert_eq!(
            drain(&mut rx),
            vec![
                RoomEvent::MatchStartedChanged { old: false, new: true },
                RoomEvent::MatchStartedChanged { old: true, new: false },
            ]
        );
    }

    #[test]
    fn test_on_host_lost_clears_and_closes() {
        let mut replica = RoomReplica::new(2);
        replica
            .apply(Replication::Snapshot {
                roster: vec![player(0, true), player(1, true)],
                match_started: true,
                session_id: Some(SessionId::new("s")),
            })
            .unwrap();
        let mut rx = replica.subscribe();

        replica.on_host_lost();

        assert!(replica.roster().is_empty());
        assert!(!replica.match_started());
        assert!(replica.session_id().is_none());
        let events = drain(&mut rx);
        assert_eq!(events.last(), Some(&RoomEvent::Closed));
        assert!(events.contains(&RoomEvent::RosterChanged(Vec::new())));
    }

    #[test]
    fn test_dropped_subscriber_is_deregistered() {
        let replica = RoomReplica::new(2);
        let rx = replica.subscribe();
        assert_eq!(replica.events.receiver_count(), 1);
        drop(rx);
        assert_eq!(replica.events.receiver_count(), 0);
    }

    #[test]
    fn test_slots_show_empty_positions() {
        let mut replica = RoomReplica::new(2);
        replica
            .apply(Replication::Roster {
                change: RosterChange::Add { player: player(0, false) },
            })
            .unwrap();
        let slots = replica.slots();
        assert!(slots[0].is_some());
        assert!(slots[1].is_none());
        assert_eq!(replica.snapshot().slots(2).len(), 2);
    }
}
