//! The peer side of a room: connect to a host, identify, and follow the
//! room through a replica.

use std::sync::Arc;
use std::time::Duration;

use readyroom_protocol::{
    Codec, Identity, JsonCodec, NamedMessage, Payload, PeerId, RoomRequest, SystemMessage,
    PROTOCOL_VERSION,
};
use readyroom_room::{RoomEvent, RoomReplica, RoomSnapshot};
use readyroom_transport::{Connection, WebSocketConnection};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::wire::Outbox;
use crate::ReadyroomError;

/// How long to wait for the host's answer to `Hello`.
const WELCOME_TIMEOUT: Duration = Duration::from_secs(5);

/// A peer's membership in a hosted room.
///
/// All room state is read-only here; changes are requests the host may
/// refuse. When the host goes away the replica empties and observers get
/// [`RoomEvent::Closed`].
pub struct PeerSession {
    peer_id: PeerId,
    host_id: PeerId,
    conn: Arc<WebSocketConnection>,
    outbox: Arc<Outbox<JsonCodec>>,
    events: broadcast::Sender<RoomEvent>,
    state: watch::Receiver<RoomSnapshot>,
    reader: JoinHandle<()>,
}

impl PeerSession {
    /// Connects to the host at `addr`, completes the handshake and sends
    /// `identity`.
    ///
    /// `capacity` sizes the replica's slot view.
    ///
    /// # Errors
    /// [`ReadyroomError::Rejected`] if the room is full,
    /// [`ReadyroomError::Handshake`] if the host answers anything else
    /// than `Welcome`.
    pub async fn connect(
        addr: &str,
        identity: &Identity,
        capacity: usize,
    ) -> Result<Self, ReadyroomError> {
        let conn = Arc::new(WebSocketConnection::connect(addr).await?);
        let outbox = Arc::new(Outbox::new(Arc::clone(&conn), JsonCodec));

        outbox
            .send_system(SystemMessage::Hello {
                version: PROTOCOL_VERSION,
            })
            .await?;
        let (peer_id, host_id) = match await_welcome(&conn, &outbox).await {
            Ok(ids) => ids,
            Err(e) => {
                let _ = conn.close().await;
                return Err(e);
            }
        };
        tracing::info!(%peer_id, addr, "admitted by host");

        outbox
            .send(Payload::Named(
                RoomRequest::Register(identity.to_payload()).into(),
            ))
            .await?;

        let replica = RoomReplica::new(capacity);
        let events = replica.event_sender();
        let state = replica.watch();
        let reader = tokio::spawn(read_replication(
            peer_id,
            Arc::clone(&conn),
            Arc::clone(&outbox),
            replica,
        ));

        Ok(Self {
            peer_id,
            host_id,
            conn,
            outbox,
            events,
            state,
            reader,
        })
    }

    /// The id the host knows this peer by.
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn host_id(&self) -> PeerId {
        self.host_id
    }

    /// Asks the host to flip this peer's ready flag.
    pub async fn toggle_ready(&self) -> Result<(), ReadyroomError> {
        self.request(RoomRequest::ToggleReady).await
    }

    /// Asks the host to start the match. Hosts refuse this from peers;
    /// the refusal arrives as a 403 error, logged by the reader.
    pub async fn request_start(&self) -> Result<(), ReadyroomError> {
        self.request(RoomRequest::StartMatch).await
    }

    /// Sends an arbitrary named message.
    pub async fn send_named(&self, msg: NamedMessage) -> Result<(), ReadyroomError> {
        self.outbox.send(Payload::Named(msg)).await
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }

    pub fn watch(&self) -> watch::Receiver<RoomSnapshot> {
        self.state.clone()
    }

    /// `false` once the connection to the host is gone.
    pub fn is_connected(&self) -> bool {
        !self.reader.is_finished()
    }

    /// Leaves the room: says goodbye, closes the connection and waits
    /// for the reader to wind down.
    pub async fn leave(self) {
        tracing::info!(peer_id = %self.peer_id, "leaving room");
        self.outbox
            .close_with(SystemMessage::Disconnect {
                reason: "peer left".into(),
            })
            .await;
        if tokio::time::timeout(WELCOME_TIMEOUT, self.reader).await.is_err() {
            tracing::debug!(peer_id = %self.peer_id, "reader did not stop in time");
        }
        drop(self.conn);
    }

    async fn request(&self, request: RoomRequest) -> Result<(), ReadyroomError> {
        self.outbox.send(Payload::Named(request.into())).await
    }
}

/// Waits for `Welcome`. Returns `(peer_id, host_id)`.
async fn await_welcome<C: Codec>(
    conn: &WebSocketConnection,
    outbox: &Outbox<C>,
) -> Result<(PeerId, PeerId), ReadyroomError> {
    let data = match tokio::time::timeout(WELCOME_TIMEOUT, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ReadyroomError::Handshake("host closed the connection".into()));
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(ReadyroomError::Handshake("no welcome from host".into())),
    };

    match outbox.decode(&data)?.payload {
        Payload::System(SystemMessage::Welcome { peer_id, host_id }) => Ok((peer_id, host_id)),
        Payload::System(SystemMessage::Rejected { reason }) => Err(ReadyroomError::Rejected(reason)),
        Payload::System(SystemMessage::Error { code, message }) => {
            Err(ReadyroomError::Handshake(format!("{code}: {message}")))
        }
        other => Err(ReadyroomError::Handshake(format!(
            "expected Welcome, got {other:?}"
        ))),
    }
}

/// Applies host updates to the replica until the host goes away.
async fn read_replication<C: Codec>(
    peer_id: PeerId,
    conn: Arc<WebSocketConnection>,
    outbox: Arc<Outbox<C>>,
    mut replica: RoomReplica,
) {
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%peer_id, "host closed the connection");
                break;
            }
            Err(e) => {
                tracing::info!(%peer_id, error = %e, "lost connection to host");
                break;
            }
        };

        let envelope = match outbox.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%peer_id, error = %e, "failed to decode envelope");
                continue;
            }
        };

        match envelope.payload {
            Payload::Replicate(update) => {
                if let Err(e) = replica.apply(update) {
                    tracing::warn!(%peer_id, error = %e, "dropping replication update");
                }
            }
            Payload::System(SystemMessage::Disconnect { reason }) => {
                tracing::info!(%peer_id, %reason, "host disconnected us");
                break;
            }
            Payload::System(SystemMessage::Error { code, message }) => {
                tracing::warn!(%peer_id, code, %message, "host refused a request");
            }
            Payload::System(SystemMessage::Rejected { reason }) => {
                tracing::info!(%peer_id, %reason, "rejected by host");
                break;
            }
            Payload::System(_) => {
                tracing::debug!(%peer_id, "ignoring unexpected system message");
            }
            Payload::Named(msg) => {
                tracing::debug!(%peer_id, name = %msg.name, "no handler for named message, dropping");
            }
        }
    }

    replica.on_host_lost();
}
