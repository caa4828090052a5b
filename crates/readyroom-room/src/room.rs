//! Room actor: an isolated Tokio task that owns a hosted room.
//!
//! Every mutation goes through the actor's command channel and is
//! handled one at a time, so the engine never sees concurrent callers.
//! Directory calls run in their own tasks; their results come back on
//! a second channel and are applied in the same loop.

use std::collections::HashMap;
use std::sync::Arc;

use readyroom_directory::DirectoryClient;
use readyroom_protocol::{PeerId, PlayerInfo, Replication, RoomRequest, SessionId};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::{
    HostToken, RegistrationTicket, RoomConfig, RoomEffect, RoomError, RoomEvent,
    RoomId, RoomMembershipEngine, RoomReplica, RoomSnapshot,
};

/// An outbound message from the room actor to a peer's connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomOutbound {
    Replicate(Replication),
    /// Say goodbye and close the connection.
    Disconnect { reason: String },
}

/// Channel for delivering outbound messages to one peer, drained by
/// that peer's connection writer in order.
pub type PeerSender = mpsc::UnboundedSender<RoomOutbound>;

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    /// A connection arrived and wants a slot.
    PeerConnected {
        peer: PeerId,
        sender: PeerSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// A connection went away.
    PeerDisconnected { peer: PeerId },

    /// A request from a peer, or from the host as [`PeerId::HOST`].
    Request {
        peer: PeerId,
        request: RoomRequest,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    AssignSession {
        session_id: SessionId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    ExitMatch {
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Disconnect everyone and stop.
    Shutdown {
        reason: String,
        reply: oneshot::Sender<()>,
    },
}

/// A finished directory registration.
struct RegistrationDone {
    ticket: RegistrationTicket,
    succeeded: bool,
}

/// Handle to a running room actor.
///
/// Cheap to clone. Holding a handle is what makes its holder the host:
/// host-only operations go through here, and requests from peers are
/// stamped with the peer id of the connection they arrived on.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    capacity: usize,
    sender: mpsc::Sender<RoomCommand>,
    events: broadcast::Sender<RoomEvent>,
    state: watch::Receiver<RoomSnapshot>,
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Asks for a slot for a new connection.
    ///
    /// # Errors
    /// [`RoomError::RoomFull`] when there is none; drop the connection.
    pub async fn peer_connected(
        &self,
        peer: PeerId,
        sender: PeerSender,
    ) -> Result<(), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::PeerConnected {
            peer,
            sender,
            reply,
        })
        .await?;
        rx.await.map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    /// Reports a closed connection (fire-and-forget).
    pub async fn peer_disconnected(&self, peer: PeerId) -> Result<(), RoomError> {
        self.send(RoomCommand::PeerDisconnected { peer }).await
    }

    /// Delivers a request on behalf of `peer`.
    pub async fn request(&self, peer: PeerId, request: RoomRequest) -> Result<(), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Request {
            peer,
            request,
            reply,
        })
        .await?;
        rx.await.map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    /// Flips the host's own ready flag.
    pub async fn toggle_ready(&self) -> Result<(), RoomError> {
        self.request(PeerId::HOST, RoomRequest::ToggleReady).await
    }

    /// Starts the match as the host.
    pub async fn start_match(&self) -> Result<(), RoomError> {
        self.request(PeerId::HOST, RoomRequest::StartMatch).await
    }

    /// Cancels or exits the match, returning the room to Open.
    pub async fn exit_match(&self) -> Result<(), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::ExitMatch { reply }).await?;
        rx.await.map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    /// Links the room to its directory session.
    pub async fn assign_session(&self, session_id: SessionId) -> Result<(), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::AssignSession { session_id, reply })
            .await?;
        rx.await.map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    /// Disconnects every peer and stops the actor. Resolves once the
    /// goodbyes are queued.
    pub async fn shutdown(&self, reason: impl Into<String>) -> Result<(), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Shutdown {
            reason: reason.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// The room as of the last handled command.
    pub fn snapshot(&self) -> RoomSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }

    pub fn watch(&self) -> watch::Receiver<RoomSnapshot> {
        self.state.clone()
    }

    /// `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<D: DirectoryClient> {
    engine: RoomMembershipEngine,
    token: HostToken,
    /// The host's own view, refreshed after every command.
    view: RoomReplica,
    /// Per-peer outbound channels, identified or not.
    senders: HashMap<PeerId, PeerSender>,
    directory: Arc<D>,
    receiver: mpsc::Receiver<RoomCommand>,
    completions_tx: mpsc::UnboundedSender<RegistrationDone>,
    completions: mpsc::UnboundedReceiver<RegistrationDone>,
}

impl<D: DirectoryClient> RoomActor<D> {
    fn room_id(&self) -> RoomId {
        self.engine.room_id()
    }

    /// Runs the actor loop until shutdown or until every handle is gone.
    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id(), "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle_command(cmd) {
                        break;
                    }
                }
                Some(done) = self.completions.recv() => {
                    let effects = self.engine.on_registration_finished(done.ticket, done.succeeded);
                    self.perform(effects);
                }
            }
            self.refresh_view();
        }

        self.view.on_host_lost();
        tracing::info!(room_id = %self.room_id(), "room actor stopped");
    }

    /// Handles one command. Returns `false` to stop the actor.
    fn handle_command(&mut self, cmd: RoomCommand) -> bool {
        match cmd {
            RoomCommand::PeerConnected {
                peer,
                sender,
                reply,
            } => {
                let result = self.engine.on_peer_connected(&self.token, peer);
                let result = result.map(|effects| {
                    self.senders.insert(peer, sender);
                    self.perform(effects);
                });
                self.refresh_view();
                let _ = reply.send(result);
            }
            RoomCommand::PeerDisconnected { peer } => {
                let result = self.engine.on_peer_disconnected(&self.token, peer);
                self.senders.remove(&peer);
                self.settle(result);
            }
            RoomCommand::Request {
                peer,
                request,
                reply,
            } => {
                let result = self.handle_request(peer, request);
                self.refresh_view();
                let _ = reply.send(result);
            }
            RoomCommand::AssignSession { session_id, reply } => {
                let result = self.engine.assign_session_id(&self.token, session_id);
                let result = result.map(|effects| self.perform(effects));
                self.refresh_view();
                let _ = reply.send(result);
            }
            RoomCommand::ExitMatch { reply } => {
                let result = self.engine.cancel_or_exit_match(&self.token);
                let result = result.map(|effects| self.perform(effects));
                self.refresh_view();
                let _ = reply.send(result);
            }
            RoomCommand::Shutdown { reason, reply } => {
                let result = self.engine.shutdown(&self.token, &reason);
                self.settle(result);
                self.senders.clear();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn handle_request(&mut self, peer: PeerId, request: RoomRequest) -> Result<(), RoomError> {
        let effects = match request {
            RoomRequest::Register(payload) => self.engine.submit_identity(peer, &payload)?,
            RoomRequest::ToggleReady => self.engine.toggle_ready(peer),
            RoomRequest::StartMatch => self.engine.request_start(peer)?,
        };
        self.perform(effects);
        Ok(())
    }

    /// Performs the effects of an operation nobody awaits a reply for.
    fn settle(&mut self, result: Result<Vec<RoomEffect>, RoomError>) {
        match result {
            Ok(effects) => self.perform(effects),
            Err(e) => tracing::warn!(room_id = %self.room_id(), error = %e, "room operation failed"),
        }
    }

    fn perform(&mut self, effects: Vec<RoomEffect>) {
        for effect in effects {
            match effect {
                RoomEffect::Send(recipient, update) => {
                    let roster = self.engine.roster();
                    for (peer, sender) in &self.senders {
                        if roster.contains(*peer) && recipient.includes(*peer) {
                            let _ = sender.send(RoomOutbound::Replicate(update.clone()));
                        }
                    }
                }
                RoomEffect::Register {
                    peer,
                    session_id,
                    user_id,
                    ticket,
                } => {
                    let directory = Arc::clone(&self.directory);
                    let done = self.completions_tx.clone();
                    tokio::spawn(async move {
                        let result = directory.register_player(&session_id, &user_id).await;
                        if let Err(e) = &result {
                            tracing::warn!(
                                %session_id,
                                %peer,
                                user = %user_id,
                                error = %e,
                                "directory registration failed"
                            );
                        }
                        let _ = done.send(RegistrationDone {
                            ticket,
                            succeeded: result.is_ok(),
                        });
                    });
                }
                RoomEffect::Unregister {
                    session_id,
                    user_id,
                } => {
                    let directory = Arc::clone(&self.directory);
                    tokio::spawn(async move {
                        if let Err(e) = directory.unregister_player(&session_id, &user_id).await {
                            tracing::warn!(
                                %session_id,
                                user = %user_id,
                                error = %e,
                                "directory unregistration failed"
                            );
                        }
                    });
                }
                RoomEffect::Disconnect { peer, reason } => {
                    if let Some(sender) = self.senders.remove(&peer) {
                        let _ = sender.send(RoomOutbound::Disconnect { reason });
                    }
                }
            }
        }
    }

    fn refresh_view(&mut self) {
        if let Err(e) = self.view.apply(self.engine.snapshot()) {
            tracing::error!(room_id = %self.room_id(), error = %e, "host view rejected snapshot");
        }
    }
}

/// Spawns a new room actor task with `host` as its first player and
/// returns a handle to it.
pub(crate) fn spawn_room<D: DirectoryClient>(
    config: &RoomConfig,
    host: PlayerInfo,
    directory: Arc<D>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));
    let (completions_tx, completions) = mpsc::unbounded_channel();

    let (engine, token) = RoomMembershipEngine::open(config, host);
    let room_id = engine.room_id();
    let mut view = RoomReplica::new(engine.roster().capacity());
    if let Err(e) = view.apply(engine.snapshot()) {
        tracing::error!(%room_id, error = %e, "host view rejected initial snapshot");
    }

    let handle = RoomHandle {
        room_id,
        capacity: engine.roster().capacity(),
        sender: tx,
        events: view.event_sender(),
        state: view.watch(),
    };

    let actor = RoomActor {
        engine,
        token,
        view,
        senders: HashMap::new(),
        directory,
        receiver: rx,
        completions_tx,
        completions,
    };
    tokio::spawn(actor.run());

    handle
}
