//! Directory registration bookkeeping.
//!
//! Registering a player with the directory is a slow remote call that can
//! finish after the player already left. The tracker remembers, per peer,
//! how far registration got so that a departed player is unregistered
//! exactly once: right away if registration had finished, when the late
//! success lands if it was still in flight, never if it failed or never
//! started.

use std::collections::HashMap;
use std::fmt;

use readyroom_protocol::{PeerId, UserId};

/// Correlates a registration request with its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationTicket(u64);

impl fmt::Display for RegistrationTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reg-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Registration {
    /// Waiting for the room to get a session id.
    Deferred(UserId),
    /// Request sent, no answer yet.
    Pending(RegistrationTicket, UserId),
    Registered(UserId),
}

/// What a completion means for the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// The player is now registered.
    Registered,
    /// Registration failed for a player still in the room. Nothing to undo.
    Failed,
    /// The player left while the request was in flight and it succeeded
    /// anyway. Unregister this user.
    Compensate(UserId),
    /// Late completion with nothing to do: a cancelled request that
    /// failed, or a ticket the tracker never issued.
    Ignored,
}

#[derive(Debug, Default)]
pub struct RegistrationTracker {
    next_ticket: u64,
    by_peer: HashMap<PeerId, Registration>,
    /// In-flight requests whose peer already left.
    cancelled: HashMap<RegistrationTicket, UserId>,
}

impl RegistrationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks a registration until a session id exists.
    pub fn defer(&mut self, peer: PeerId, user_id: UserId) {
        self.by_peer.insert(peer, Registration::Deferred(user_id));
    }

    /// Marks a registration as sent and returns its ticket.
    pub fn begin(&mut self, peer: PeerId, user_id: UserId) -> RegistrationTicket {
        let ticket = RegistrationTicket(self.next_ticket);
        self.next_ticket += 1;
        self.by_peer
            .insert(peer, Registration::Pending(ticket, user_id));
        ticket
    }

    /// Takes every deferred registration, leaving those peers untracked
    /// until the caller [`begin`](Self::begin)s them.
    pub fn take_deferred(&mut self) -> Vec<(PeerId, UserId)> {
        let peers: Vec<PeerId> = self
            .by_peer
            .iter()
            .filter(|(_, r)| matches!(r, Registration::Deferred(_)))
            .map(|(peer, _)| *peer)
            .collect();

        let mut deferred = Vec::with_capacity(peers.len());
        for peer in peers {
            if let Some(Registration::Deferred(user_id)) = self.by_peer.remove(&peer) {
                deferred.push((peer, user_id));
            }
        }
        deferred.sort_by_key(|(peer, _)| *peer);
        deferred
    }

    /// Forgets a departed peer. Returns the user to unregister now, if
    /// registration had already finished.
    pub fn cancel(&mut self, peer: PeerId) -> Option<UserId> {
        match self.by_peer.remove(&peer)? {
            Registration::Registered(user_id) => Some(user_id),
            Registration::Pending(ticket, user_id) => {
                self.cancelled.insert(ticket, user_id);
                None
            }
            Registration::Deferred(_) => None,
        }
    }

    /// Records the outcome of a registration request.
    pub fn complete(
        &mut self,
        ticket: RegistrationTicket,
        succeeded: bool,
    ) -> RegistrationOutcome {
        if let Some(user_id) = self.cancelled.remove(&ticket) {
            return if succeeded {
                RegistrationOutcome::Compensate(user_id)
            } else {
                RegistrationOutcome::Ignored
            };
        }

        let peer = self.by_peer.iter().find_map(|(peer, r)| match r {
            Registration::Pending(t, _) if *t == ticket => Some(*peer),
            _ => None,
        });
        let Some(peer) = peer else {
            return RegistrationOutcome::Ignored;
        };

        if succeeded {
            if let Some(Registration::Pending(_, user_id)) = self.by_peer.remove(&peer) {
                self.by_peer.insert(peer, Registration::Registered(user_id));
            }
            RegistrationOutcome::Registered
        } else {
            self.by_peer.remove(&peer);
            RegistrationOutcome::Failed
        }
    }

    pub fn is_registered(&self, peer: PeerId) -> bool {
        matches!(self.by_peer.get(&peer), Some(Registration::Registered(_)))
    }

    pub fn is_pending(&self, peer: PeerId) -> bool {
        matches!(self.by_peer.get(&peer), Some(Registration::Pending(..)))
    }

    pub fn is_deferred(&self, peer: PeerId) -> bool {
        matches!(self.by_peer.get(&peer), Some(Registration::Deferred(_)))
    }

    /// Number of cancelled requests still awaiting their completion.
    pub fn cancelled_in_flight(&self) -> usize {
        self.cancelled.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> UserId {
        UserId::new(s)
    }

    #[test]
    fn test_cancel_registered_unregisters_once() {
        let mut t = RegistrationTracker::new();
        let ticket = t.begin(PeerId(1), uid("b"));
        assert_eq!(t.complete(ticket, true), RegistrationOutcome::Registered);
        assert!(t.is_registered(PeerId(1)));

        assert_eq!(t.cancel(PeerId(1)), Some(uid("b")));
        assert_eq!(t.cancel(PeerId(1)), None);
    }

    #[test]
    fn test_cancel_pending_then_success_compensates() {
        let mut t = RegistrationTracker::new();
        let ticket = t.begin(PeerId(1), uid("b"));
        assert_eq!(t.cancel(PeerId(1)), None);
        assert_eq!(t.cancelled_in_flight(), 1);

        assert_eq!(
            t.complete(ticket, true),
            RegistrationOutcome::Compensate(uid("b"))
        );
        assert_eq!(t.cancelled_in_flight(), 0);
        // A duplicate completion doesn't compensate twice.
        assert_eq!(t.complete(ticket, true), RegistrationOutcome::Ignored);
    }

    #[test]
    fn test_cancel_pending_then_failure_is_ignored() {
        let mut t = RegistrationTracker::new();
        let ticket = t.begin(PeerId(1), uid("b"));
        t.cancel(PeerId(1));
        assert_eq!(t.complete(ticket, false), RegistrationOutcome::Ignored);
    }

    #[test]
    fn test_failed_registration_needs_no_unregister() {
        let mut t = RegistrationTracker::new();
        let ticket = t.begin(PeerId(1), uid("b"));
        assert_eq!(t.complete(ticket, false), RegistrationOutcome::Failed);
        assert_eq!(t.cancel(PeerId(1)), None);
    }

    #[test]
    fn test_cancel_deferred_is_silent() {
        let mut t = RegistrationTracker::new();
        t.defer(PeerId(1), uid("b"));
        assert!(t.is_deferred(PeerId(1)));
        assert_eq!(t.cancel(PeerId(1)), None);
        assert!(t.take_deferred().is_empty());
    }

    #[test]
    fn test_take_deferred_in_peer_order() {
        let mut t = RegistrationTracker::new();
        t.defer(PeerId(4), uid("d"));
        t.defer(PeerId(2), uid("b"));
        let ticket = t.begin(PeerId(3), uid("c"));

        let deferred = t.take_deferred();
        assert_eq!(deferred, vec![(PeerId(2), uid("b")), (PeerId(4), uid("d"))]);
        assert!(t.is_pending(PeerId(3)));
        assert_eq!(t.complete(ticket, true), RegistrationOutcome::Registered);
    }

    #[test]
    fn test_unknown_ticket_is_ignored() {
        let mut t = RegistrationTracker::new();
        let ticket = t.begin(PeerId(1), uid("a"));
        t.complete(ticket, true);
        assert_eq!(t.complete(ticket, true), RegistrationOutcome::Ignored);
    }

    #[test]
    fn test_tickets_are_distinct() {
        let mut t = RegistrationTracker::new();
        let a = t.begin(PeerId(1), uid("a"));
        let b = t.begin(PeerId(2), uid("b"));
        assert_ne!(a, b);
    }
}
