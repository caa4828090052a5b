//! Per-connection handler: handshake, identity deadline, request routing.
//!
//! Each accepted socket gets its own Tokio task running this handler.
//! The flow is:
//!   0. Complete the WebSocket upgrade
//!   1. Receive Hello → validate version
//!   2. Ask the room for a slot → Welcome, or Rejected and close
//!   3. Spawn the writer that forwards room output to the peer
//!   4. Loop: receive envelopes → route named requests to the room,
//!      dropping the peer if it doesn't identify in time

use std::sync::Arc;
use std::time::Duration;

use readyroom_protocol::{
    Codec, Envelope, NamedMessage, Payload, PeerId, ProtocolError, RoomRequest,
    SystemMessage, PROTOCOL_VERSION,
};
use readyroom_room::{RoomError, RoomHandle, RoomOutbound};
use readyroom_transport::{Connection, IncomingConnection, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::server::ServerState;
use crate::wire::Outbox;
use crate::ReadyroomError;

/// How long a new socket may take to upgrade, and then to say `Hello`.
const HELLO_TIMEOUT: Duration = Duration::from_secs(5);

/// Drop guard that removes the peer from the room when the handler exits.
///
/// `Drop` is synchronous, so the removal is a fire-and-forget task.
struct PeerGuard {
    peer: PeerId,
    room: RoomHandle,
}

impl Drop for PeerGuard {
    fn drop(&mut self) {
        let peer = self.peer;
        let room = self.room.clone();
        tokio::spawn(async move {
            let _ = room.peer_disconnected(peer).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec + Clone>(
    incoming: IncomingConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), ReadyroomError> {
    let addr = incoming.peer_addr();
    let conn = match incoming.upgrade(HELLO_TIMEOUT).await {
        Ok(conn) => Arc::new(conn),
        Err(e) => {
            tracing::debug!(%addr, error = %e, "dropping socket that never upgraded");
            return Err(e.into());
        }
    };
    let peer = PeerId::from(conn.id());
    let outbox = Arc::new(Outbox::new(Arc::clone(&conn), state.codec.clone()));
    tracing::debug!(%peer, "handling new connection");

    // --- Step 1: Hello ---
    receive_hello(&conn, &outbox).await?;

    // --- Step 2: Admission ---
    let (tx, rx) = mpsc::unbounded_channel();
    if let Err(e) = state.room.peer_connected(peer, tx).await {
        tracing::info!(%peer, error = %e, "connection refused");
        outbox
            .close_with(SystemMessage::Rejected {
                reason: e.to_string(),
            })
            .await;
        return Ok(());
    }
    let _guard = PeerGuard {
        peer,
        room: state.room.clone(),
    };
    outbox
        .send_system(SystemMessage::Welcome {
            peer_id: peer,
            host_id: PeerId::HOST,
        })
        .await?;

    // --- Step 3: Writer ---
    tokio::spawn(write_outbound(peer, rx, Arc::clone(&outbox)));

    // --- Step 4: Message loop ---
    let deadline = Instant::now() + state.identity_timeout;
    let mut identified = false;

    loop {
        let received = if identified {
            conn.recv().await
        } else {
            match tokio::time::timeout_at(deadline, conn.recv()).await {
                Ok(received) => received,
                Err(_) => {
                    tracing::info!(%peer, "no identity in time, disconnecting");
                    outbox
                        .close_with(SystemMessage::Disconnect {
                            reason: "identity timeout".into(),
                        })
                        .await;
                    break;
                }
            }
        };

        let data = match received {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%peer, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%peer, error = %e, "recv error");
                break;
            }
        };

        let envelope = match outbox.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%peer, error = %e, "failed to decode envelope");
                continue;
            }
        };

        match envelope.payload {
            Payload::Named(msg) => {
                match handle_named(&state.room, &outbox, peer, msg).await? {
                    Handled::Identified => identified = true,
                    Handled::Continue => {}
                    Handled::Close => break,
                }
            }
            Payload::System(SystemMessage::Disconnect { reason }) => {
                tracing::info!(%peer, %reason, "peer disconnected");
                break;
            }
            Payload::System(_) => {
                tracing::debug!(%peer, "ignoring unexpected system message");
            }
            Payload::Replicate(_) => {
                tracing::debug!(%peer, "peers can't replicate, dropping");
            }
        }
    }

    // _guard drops here → the room removes the peer.
    Ok(())
}

/// Waits for the peer's `Hello` and checks its protocol version.
async fn receive_hello<C: Codec>(
    conn: &WebSocketConnection,
    outbox: &Outbox<C>,
) -> Result<(), ReadyroomError> {
    let data = match tokio::time::timeout(HELLO_TIMEOUT, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before hello".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ReadyroomError::Handshake("hello timed out".into()));
        }
    };

    let envelope: Envelope = outbox.decode(&data)?;
    let version = match envelope.payload {
        Payload::System(SystemMessage::Hello { version }) => version,
        _ => {
            outbox.send_error(400, "expected Hello").await?;
            let _ = conn.close().await;
            return Err(ReadyroomError::Handshake("first message must be Hello".into()));
        }
    };

    if version != PROTOCOL_VERSION {
        outbox
            .send_error(
                400,
                format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
            )
            .await?;
        let _ = conn.close().await;
        return Err(ReadyroomError::Handshake("protocol version mismatch".into()));
    }
    Ok(())
}

enum Handled {
    Continue,
    Identified,
    Close,
}

/// Routes one named message to the room and answers failures.
async fn handle_named<C: Codec>(
    room: &RoomHandle,
    outbox: &Outbox<C>,
    peer: PeerId,
    msg: NamedMessage,
) -> Result<Handled, ReadyroomError> {
    let name = msg.name.clone();
    let Some(request) = RoomRequest::from_named(msg) else {
        tracing::debug!(%peer, %name, "no handler for named message, dropping");
        return Ok(Handled::Continue);
    };
    let is_identity = matches!(request, RoomRequest::Register(_));

    match room.request(peer, request).await {
        Ok(()) if is_identity => Ok(Handled::Identified),
        Ok(()) => Ok(Handled::Continue),
        Err(RoomError::RoomFull { .. }) => {
            outbox
                .close_with(SystemMessage::Rejected {
                    reason: "room is full".into(),
                })
                .await;
            Ok(Handled::Close)
        }
        Err(RoomError::Unavailable(_)) => Ok(Handled::Close),
        Err(e) => {
            let code = error_code(&e);
            tracing::debug!(%peer, %name, error = %e, code, "request refused");
            outbox.send_error(code, e.to_string()).await?;
            Ok(Handled::Continue)
        }
    }
}

/// HTTP-style code a refused request is answered with.
fn error_code(e: &RoomError) -> u16 {
    match e {
        RoomError::NotAuthorized(_) => 403,
        RoomError::MalformedIdentity(_) | RoomError::NotConnected(_) => 400,
        _ => 409,
    }
}

/// Forwards room output to the peer until the room lets go of it.
async fn write_outbound<C: Codec>(
    peer: PeerId,
    mut rx: mpsc::UnboundedReceiver<RoomOutbound>,
    outbox: Arc<Outbox<C>>,
) {
    while let Some(outbound) = rx.recv().await {
        match outbound {
            RoomOutbound::Replicate(update) => {
                if let Err(e) = outbox.send(Payload::Replicate(update)).await {
                    tracing::debug!(%peer, error = %e, "send failed, writer stopping");
                    return;
                }
            }
            RoomOutbound::Disconnect { reason } => {
                tracing::debug!(%peer, %reason, "room disconnected peer");
                outbox.close_with(SystemMessage::Disconnect { reason }).await;
                return;
            }
        }
    }
}
