//! Match lifecycle: Open until the host starts, Started until the host
//! cancels or exits.

use readyroom_protocol::{PeerId, Recipient, Replication, RosterChange};

use crate::{HostToken, MatchPhase, RoomEffect, RoomError, RoomId, Roster};

#[derive(Debug)]
pub struct MatchLifecycleController {
    room_id: RoomId,
    phase: MatchPhase,
    require_all_ready: bool,
}

impl MatchLifecycleController {
    pub fn new(room_id: RoomId, require_all_ready: bool) -> Self {
        Self {
            room_id,
            phase: MatchPhase::Open,
            require_all_ready,
        }
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// The replicated `match_started` flag.
    pub fn match_started(&self) -> bool {
        self.phase.is_started()
    }

    /// Starts the match on behalf of `requester`.
    ///
    /// Only the host may start. On success `match_started` becomes true
    /// and then every ready flag is cleared, so the effects come in two
    /// groups: `MatchStarted { value: true }` first, then one roster
    /// `Update` per entry that was ready.
    ///
    /// # Errors
    /// - [`RoomError::NotAuthorized`] if `requester` isn't the host
    /// - [`RoomError::InvalidPhase`] if the match already started
    /// - [`RoomError::NotAllReady`] if readiness is required and missing
    pub fn request_start(
        &mut self,
        members: &mut Roster,
        requester: PeerId,
    ) -> Result<Vec<RoomEffect>, RoomError> {
        if !requester.is_host() {
            tracing::debug!(room_id = %self.room_id, %requester, "start refused: not host");
            return Err(RoomError::NotAuthorized("start the match"));
        }
        if !self.phase.can_transition_to(MatchPhase::Started) {
            return Err(RoomError::InvalidPhase(self.phase));
        }
        if self.require_all_ready && !members.all_ready() {
            return Err(RoomError::NotAllReady);
        }

        self.phase = MatchPhase::Started;
        let mut effects = vec![RoomEffect::Send(
            Recipient::All,
            Replication::MatchStarted { value: true },
        )];
        for index in members.reset_ready() {
            let player = members.entries()[index].clone();
            effects.push(RoomEffect::Send(
                Recipient::All,
                Replication::Roster {
                    change: RosterChange::Update { index, player },
                },
            ));
        }

        tracing::info!(
            room_id = %self.room_id,
            players = members.len(),
            "match started"
        );
        Ok(effects)
    }

    /// Cancels a starting match or leaves a running one.
    ///
    /// Back to Open with the roster untouched. Already Open is a no-op.
    pub fn cancel_or_exit_match(
        &mut self,
        token: &HostToken,
    ) -> Result<Vec<RoomEffect>, RoomError> {
        token.authorize(self.room_id, "cancel the match")?;
        if !self.phase.can_transition_to(MatchPhase::Open) {
            return Ok(Vec::new());
        }
        self.phase = MatchPhase::Open;
        tracing::info!(room_id = %self.room_id, "match ended, room open");
        Ok(vec![RoomEffect::Send(
            Recipient::All,
            Replication::MatchStarted { value: false },
        )])
    }
}
