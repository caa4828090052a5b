//! `HostServer` builder and accept loop.
//!
//! The host side of a lobby: opens the room, listens for peers, and
//! spawns a handler task per connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use readyroom_directory::DirectoryClient;
use readyroom_protocol::{Codec, Identity, JsonCodec, PeerId, PlayerInfo};
use readyroom_room::{RoomConfig, RoomHandle, RoomManager};
use readyroom_transport::{Transport, WebSocketTransport};
use tokio::sync::watch;

use crate::handler::handle_connection;
use crate::{LobbyConfig, ReadyroomError};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) room: RoomHandle,
    pub(crate) codec: C,
    pub(crate) identity_timeout: Duration,
}

/// Builder for configuring and starting a host server.
///
/// # Example
///
/// ```rust,ignore
/// let mut rooms = RoomManager::new();
/// let server = HostServerBuilder::new()
///     .bind("0.0.0.0:7777")
///     .build(host_identity, directory, &mut rooms)
///     .await?;
/// let shutdown = server.shutdown_handle();
/// tokio::spawn(server.run());
/// ```
pub struct HostServerBuilder {
    bind_addr: String,
    identity_timeout: Duration,
    room_config: RoomConfig,
}

impl HostServerBuilder {
    /// Creates a new builder with [`LobbyConfig`] defaults.
    pub fn new() -> Self {
        Self::from_config(&LobbyConfig::default())
    }

    pub fn from_config(config: &LobbyConfig) -> Self {
        Self {
            bind_addr: config.bind_addr.clone(),
            identity_timeout: config.identity_timeout(),
            room_config: config.room.clone(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// How long a connected peer may take to identify.
    pub fn identity_timeout(mut self, timeout: Duration) -> Self {
        self.identity_timeout = timeout;
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Binds the listener and opens the room, with `host` as its first
    /// player.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    ///
    /// # Errors
    /// Fails if binding fails or `rooms` already has a live room.
    pub async fn build<D: DirectoryClient>(
        self,
        host: &Identity,
        directory: Arc<D>,
        rooms: &mut RoomManager,
    ) -> Result<HostServer<JsonCodec>, ReadyroomError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let host_player = PlayerInfo::new(
            PeerId::HOST,
            host.user_id.clone(),
            host.display_name.clone(),
        );
        let room = rooms.open(&self.room_config, host_player, directory)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let state = Arc::new(ServerState {
            room,
            codec: JsonCodec,
            identity_timeout: self.identity_timeout,
        });

        Ok(HostServer {
            transport,
            state,
            shutdown_tx,
            shutdown_rx,
        })
    }
}

impl Default for HostServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Stops a running host: tells every peer goodbye, then stops accepting.
#[derive(Clone)]
pub struct ShutdownHandle {
    room: RoomHandle,
    signal: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub async fn shutdown(&self, reason: &str) {
        if let Err(e) = self.room.shutdown(reason).await {
            tracing::debug!(error = %e, "room already stopped");
        }
        let _ = self.signal.send(true);
    }
}

/// A bound host server.
///
/// Call [`run()`](Self::run) to start accepting peers.
pub struct HostServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<C> HostServer<C>
where
    C: Codec + Clone,
{
    /// Creates a new builder.
    pub fn builder() -> HostServerBuilder {
        HostServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The hosted room. Host-local actions go through here.
    pub fn room(&self) -> &RoomHandle {
        &self.state.room
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            room: self.state.room.clone(),
            signal: self.shutdown_tx.clone(),
        }
    }

    /// Runs the accept loop until [`ShutdownHandle::shutdown`].
    pub async fn run(mut self) -> Result<(), ReadyroomError> {
        let room_id = self.state.room.room_id();
        tracing::info!(%room_id, "host server running");

        loop {
            tokio::select! {
                accepted = self.transport.accept_incoming() => match accepted {
                    Ok(incoming) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(incoming, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        self.transport.shutdown().await?;
        tracing::info!(%room_id, "host server stopped");
        Ok(())
    }
}
