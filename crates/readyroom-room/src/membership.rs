//! The host-side room core.
//!
//! [`RoomMembershipEngine`] owns the canonical roster, the match
//! lifecycle and registration bookkeeping. It never does I/O: every
//! operation returns the [`RoomEffect`]s that the room actor then
//! performs, in order.

use std::collections::BTreeSet;

use readyroom_protocol::{
    Identity, PeerId, PlayerInfo, Recipient, Replication, RosterChange, SessionId,
};

use crate::{
    HostToken, MatchLifecycleController, MatchPhase, RegistrationOutcome,
    RegistrationTicket, RegistrationTracker, RoomConfig, RoomEffect, RoomError,
    RoomId, Roster,
};

#[derive(Debug)]
pub struct RoomMembershipEngine {
    room_id: RoomId,
    roster: Roster,
    /// Connected but not yet identified. Holds a slot each.
    pending: BTreeSet<PeerId>,
    session_id: Option<SessionId>,
    lifecycle: MatchLifecycleController,
    registrations: RegistrationTracker,
}

impl RoomMembershipEngine {
    /// Opens a room under a fresh [`RoomId`] with the host as its first
    /// roster entry, and returns the room's only [`HostToken`].
    ///
    /// The host's `peer_id` is forced to [`PeerId::HOST`].
    pub fn open(config: &RoomConfig, mut host: PlayerInfo) -> (Self, HostToken) {
        let room_id = RoomId::next();
        host.peer_id = PeerId::HOST;
        host.is_ready = false;
        let mut roster = Roster::new(config.capacity.max(1));
        roster.replace(vec![host]);

        let engine = Self {
            room_id,
            roster,
            pending: BTreeSet::new(),
            session_id: None,
            lifecycle: MatchLifecycleController::new(room_id, config.require_all_ready),
            registrations: RegistrationTracker::new(),
        };
        (engine, HostToken::issue(room_id))
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn phase(&self) -> MatchPhase {
        self.lifecycle.phase()
    }

    pub fn match_started(&self) -> bool {
        self.lifecycle.match_started()
    }

    pub fn registrations(&self) -> &RegistrationTracker {
        &self.registrations
    }

    /// Connected peers that haven't identified yet.
    pub fn pending_peers(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.pending.iter().copied()
    }

    pub fn is_pending(&self, peer: PeerId) -> bool {
        self.pending.contains(&peer)
    }

    /// The whole room as a replication update.
    pub fn snapshot(&self) -> Replication {
        Replication::Snapshot {
            roster: self.roster.to_vec(),
            match_started: self.lifecycle.match_started(),
            session_id: self.session_id.clone(),
        }
    }

    // -----------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------

    /// Admits a freshly connected peer, reserving a slot until it
    /// identifies.
    ///
    /// # Errors
    /// - [`RoomError::RoomFull`] when roster plus pending peers already
    ///   fill the room. The caller drops the connection.
    /// - [`RoomError::AlreadyInRoom`] if the peer is already known.
    pub fn on_peer_connected(
        &mut self,
        token: &HostToken,
        peer: PeerId,
    ) -> Result<Vec<RoomEffect>, RoomError> {
        token.authorize(self.room_id, "admit a peer")?;
        if peer.is_host() || self.roster.contains(peer) || self.pending.contains(&peer) {
            return Err(RoomError::AlreadyInRoom(peer));
        }
        if self.roster.len() + self.pending.len() >= self.roster.capacity() {
            tracing::info!(
                room_id = %self.room_id,
                %peer,
                capacity = self.roster.capacity(),
                "room full, rejecting connection"
            );
            return Err(RoomError::RoomFull {
                capacity: self.roster.capacity(),
            });
        }

        self.pending.insert(peer);
        tracing::debug!(room_id = %self.room_id, %peer, "peer awaiting identity");
        Ok(Vec::new())
    }

    /// Accepts a peer's `"<userId>:<displayName>"` identity.
    ///
    /// The new entry joins not ready. The new peer gets a full snapshot,
    /// everyone else a roster `Add`, and the directory a registration
    /// (deferred until the room has a session id).
    ///
    /// # Errors
    /// - [`RoomError::MalformedIdentity`]; the peer stays pending
    /// - [`RoomError::AlreadyInRoom`] if the peer already identified
    /// - [`RoomError::NotConnected`] if the peer never connected
    /// - [`RoomError::RoomFull`] if the room filled up meanwhile
    pub fn submit_identity(
        &mut self,
        peer: PeerId,
        payload: &str,
    ) -> Result<Vec<RoomEffect>, RoomError> {
        let identity = Identity::parse(payload)
            .map_err(|e| RoomError::MalformedIdentity(e.to_string()))?;
        if peer.is_host() || self.roster.contains(peer) {
            return Err(RoomError::AlreadyInRoom(peer));
        }
        if !self.pending.contains(&peer) {
            return Err(RoomError::NotConnected(peer));
        }
        if self.roster.is_full() {
            return Err(RoomError::RoomFull {
                capacity: self.roster.capacity(),
            });
        }

        let Identity {
            user_id,
            display_name,
        } = identity;
        let player = PlayerInfo::new(peer, user_id.clone(), display_name);
        self.roster.add(player.clone())?;
        self.pending.remove(&peer);

        tracing::info!(
            room_id = %self.room_id,
            %peer,
            user = %user_id,
            players = self.roster.len(),
            "player joined"
        );

        let mut effects = vec![
            RoomEffect::Send(Recipient::Peer(peer), self.snapshot()),
            RoomEffect::Send(
                Recipient::AllExcept(peer),
                Replication::Roster {
                    change: RosterChange::Add { player },
                },
            ),
        ];
        match &self.session_id {
            Some(session_id) => {
                let ticket = self.registrations.begin(peer, user_id.clone());
                effects.push(RoomEffect::Register {
                    peer,
                    session_id: session_id.clone(),
                    user_id,
                    ticket,
                });
            }
            None => self.registrations.defer(peer, user_id),
        }
        Ok(effects)
    }

    /// Flips the ready flag of `peer`'s entry. Unknown peers are ignored.
    ///
    /// Each delivered request toggles once; requests arrive over a
    /// reliable, ordered, exactly-once connection.
    pub fn toggle_ready(&mut self, peer: PeerId) -> Vec<RoomEffect> {
        let Some((index, player)) = self.roster.toggle_ready(peer) else {
            tracing::debug!(room_id = %self.room_id, %peer, "toggle from unknown peer ignored");
            return Vec::new();
        };
        tracing::debug!(
            room_id = %self.room_id,
            %peer,
            ready = player.is_ready,
            "ready toggled"
        );
        vec![RoomEffect::Send(
            Recipient::All,
            Replication::Roster {
                change: RosterChange::Update {
                    index,
                    player: player.clone(),
                },
            },
        )]
    }

    /// Removes a departed peer. Unknown peers are a no-op.
    ///
    /// A registered player is unregistered right away; one whose
    /// registration is still in flight gets compensated when it lands.
    pub fn on_peer_disconnected(
        &mut self,
        token: &HostToken,
        peer: PeerId,
    ) -> Result<Vec<RoomEffect>, RoomError> {
        token.authorize(self.room_id, "remove a peer")?;
        if self.pending.remove(&peer) {
            tracing::debug!(room_id = %self.room_id, %peer, "unidentified peer left");
            return Ok(Vec::new());
        }
        if peer.is_host() {
            return Ok(Vec::new());
        }
        let Some((index, player)) = self.roster.remove(peer) else {
            return Ok(Vec::new());
        };

        tracing::info!(
            room_id = %self.room_id,
            %peer,
            user = %player.user_id,
            players = self.roster.len(),
            "player left"
        );

        let mut effects = vec![RoomEffect::Send(
            Recipient::All,
            Replication::Roster {
                change: RosterChange::RemoveAt { index },
            },
        )];
        if let Some(user_id) = self.registrations.cancel(peer) {
            if let Some(session_id) = &self.session_id {
                effects.push(RoomEffect::Unregister {
                    session_id: session_id.clone(),
                    user_id,
                });
            }
        }
        Ok(effects)
    }

    /// Links the room to its directory session and sends the
    /// registrations that were waiting for it.
    ///
    /// A room belongs to one session for life: assigning the same id
    /// again is a no-op, a different one is refused.
    pub fn assign_session_id(
        &mut self,
        token: &HostToken,
        session_id: SessionId,
    ) -> Result<Vec<RoomEffect>, RoomError> {
        token.authorize(self.room_id, "assign the session")?;
        match &self.session_id {
            Some(current) if *current == session_id => return Ok(Vec::new()),
            Some(current) => {
                tracing::warn!(
                    room_id = %self.room_id,
                    %current,
                    %session_id,
                    "refusing to move room to another session"
                );
                return Err(RoomError::SessionAlreadyAssigned(current.clone()));
            }
            None => {}
        }
        self.session_id = Some(session_id.clone());
        tracing::info!(room_id = %self.room_id, %session_id, "session assigned");

        let mut effects = vec![RoomEffect::Send(
            Recipient::All,
            Replication::SessionAssigned {
                session_id: session_id.clone(),
            },
        )];
        for (peer, user_id) in self.registrations.take_deferred() {
            let ticket = self.registrations.begin(peer, user_id.clone());
            effects.push(RoomEffect::Register {
                peer,
                session_id: session_id.clone(),
                user_id,
                ticket,
            });
        }
        Ok(effects)
    }

    /// Feeds back the outcome of a [`RoomEffect::Register`].
    pub fn on_registration_finished(
        &mut self,
        ticket: RegistrationTicket,
        succeeded: bool,
    ) -> Vec<RoomEffect> {
        match self.registrations.complete(ticket, succeeded) {
            RegistrationOutcome::Compensate(user_id) => {
                let Some(session_id) = self.session_id.clone() else {
                    return Vec::new();
                };
                tracing::info!(
                    room_id = %self.room_id,
                    %ticket,
                    user = %user_id,
                    "late registration for departed player, unregistering"
                );
                vec![RoomEffect::Unregister {
                    session_id,
                    user_id,
                }]
            }
            RegistrationOutcome::Failed => {
                tracing::warn!(room_id = %self.room_id, %ticket, "registration failed, player stays in room");
                Vec::new()
            }
            RegistrationOutcome::Registered | RegistrationOutcome::Ignored => Vec::new(),
        }
    }

    // -----------------------------------------------------------------
    // Match lifecycle
    // -----------------------------------------------------------------

    /// See [`MatchLifecycleController::request_start`].
    pub fn request_start(&mut self, requester: PeerId) -> Result<Vec<RoomEffect>, RoomError> {
        self.lifecycle.request_start(&mut self.roster, requester)
    }

    /// See [`MatchLifecycleController::cancel_or_exit_match`].
    pub fn cancel_or_exit_match(&mut self, token: &HostToken) -> Result<Vec<RoomEffect>, RoomError> {
        self.lifecycle.cancel_or_exit_match(token)
    }

    /// Tells every connected peer, identified or not, to leave.
    pub fn shutdown(
        &mut self,
        token: &HostToken,
        reason: &str,
    ) -> Result<Vec<RoomEffect>, RoomError> {
        token.authorize(self.room_id, "shut the room down")?;
        let peers: Vec<PeerId> = self
            .roster
            .iter()
            .map(|p| p.peer_id)
            .filter(|p| !p.is_host())
            .chain(self.pending.iter().copied())
            .collect();
        tracing::info!(room_id = %self.room_id, peers = peers.len(), "room shutting down");
        Ok(peers
            .into_iter()
            .map(|peer| RoomEffect::Disconnect {
                peer,
                reason: reason.to_string(),
            })
            .collect())
    }
}
