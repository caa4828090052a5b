//! One player's lobby context: browse, host, join, leave.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use readyroom_directory::{
    DirectoryClient, DirectoryError, RoomAccessibility, SessionFilter, SessionSettings,
    SessionSummary,
};
use readyroom_protocol::{Identity, SessionId};
use readyroom_room::{RoomEvent, RoomHandle, RoomManager, RoomSnapshot};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::client::PeerSession;
use crate::server::{HostServerBuilder, ShutdownHandle};
use crate::{LobbyConfig, ReadyroomError};

/// Settings blob key for the build version.
const GAME_VERSION: &str = "game_version";

/// What a player fills in to host a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRequest {
    pub session_name: String,
    pub accessibility: RoomAccessibility,
    /// Required for private sessions, ignored for public ones.
    pub password: Option<String>,
}

impl HostRequest {
    pub fn public(session_name: impl Into<String>) -> Self {
        Self {
            session_name: session_name.into(),
            accessibility: RoomAccessibility::Public,
            password: None,
        }
    }

    pub fn private(session_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            session_name: session_name.into(),
            accessibility: RoomAccessibility::Private,
            password: Some(password.into()),
        }
    }
}

/// A session this context is hosting.
pub struct HostSession {
    session_id: SessionId,
    addr: SocketAddr,
    room: RoomHandle,
    shutdown: ShutdownHandle,
    server: JoinHandle<Result<(), ReadyroomError>>,
}

impl HostSession {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Where peers connect.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn room(&self) -> &RoomHandle {
        &self.room
    }

    pub async fn toggle_ready(&self) -> Result<(), ReadyroomError> {
        Ok(self.room.toggle_ready().await?)
    }

    pub async fn start_match(&self) -> Result<(), ReadyroomError> {
        Ok(self.room.start_match().await?)
    }

    /// Cancels or exits the match; the room reopens with the same roster.
    pub async fn exit_match(&self) -> Result<(), ReadyroomError> {
        Ok(self.room.exit_match().await?)
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        self.room.snapshot()
    }

    pub fn events(&self) -> broadcast::Receiver<RoomEvent> {
        self.room.subscribe()
    }

    fn is_live(&self) -> bool {
        !self.room.is_closed()
    }

    /// Withdraws the session from the directory, then stops the room and
    /// its server.
    async fn close<D: DirectoryClient>(self, directory: &D, reason: &str) {
        withdraw_session(directory, &self.session_id).await;
        stop_server(&self.shutdown, self.server, reason).await;
    }
}

async fn stop_server(
    shutdown: &ShutdownHandle,
    server: JoinHandle<Result<(), ReadyroomError>>,
    reason: &str,
) {
    shutdown.shutdown(reason).await;
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "host server ended with error"),
        Err(e) => tracing::warn!(error = %e, "host server task failed"),
    }
}

/// Best effort: a session the directory can't remove is logged and left.
async fn withdraw_session<D: DirectoryClient>(directory: &D, session_id: &SessionId) {
    match directory.remove_session(session_id).await {
        Ok(()) => tracing::info!(%session_id, "session withdrawn"),
        Err(e) => tracing::warn!(%session_id, error = %e, "session withdrawal failed"),
    }
}

/// A player's lobby context.
///
/// Holds at most one active session, hosted or joined. Starting another
/// while one is live fails with [`ReadyroomError::AlreadyActive`]; call
/// [`leave`](Self::leave) first.
pub struct SessionOrchestrator<D: DirectoryClient> {
    directory: Arc<D>,
    config: LobbyConfig,
    identity: Identity,
    rooms: RoomManager,
    /// At most one of these is set.
    hosted: Option<HostSession>,
    joined: Option<PeerSession>,
}

impl<D: DirectoryClient> SessionOrchestrator<D> {
    /// `identity` is the player's directory account, established by
    /// whatever login flow the game uses.
    pub fn new(directory: Arc<D>, config: LobbyConfig, identity: Identity) -> Self {
        Self {
            directory,
            config,
            identity,
            rooms: RoomManager::new(),
            hosted: None,
            joined: None,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn config(&self) -> &LobbyConfig {
        &self.config
    }

    /// Sessions with this context's game mode. Directory failures are
    /// logged and read as "nothing found".
    pub async fn find_sessions(&self) -> Vec<SessionSummary> {
        let filter = SessionFilter::with_mode(self.config.game_mode.clone());
        match self.directory.list(&filter).await {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::warn!(error = %e, "session listing failed");
                Vec::new()
            }
        }
    }

    /// The name of a session, if the directory knows it.
    pub async fn session_name(&self, session_id: &SessionId) -> Option<String> {
        match self.directory.get(session_id).await {
            Ok(summary) => summary.session_name().map(str::to_string),
            Err(e) => {
                tracing::debug!(%session_id, error = %e, "session lookup failed");
                None
            }
        }
    }

    /// Hosts a new session: starts the server and room, publishes the
    /// session, and links the room to it.
    ///
    /// If any step after opening the room fails, the room and server are
    /// shut down again and the session, if created, is withdrawn.
    pub async fn host_session(&mut self, request: HostRequest) -> Result<&HostSession, ReadyroomError> {
        self.ensure_idle().await?;

        let server = HostServerBuilder::from_config(&self.config)
            .build(&self.identity, Arc::clone(&self.directory), &mut self.rooms)
            .await?;
        let addr = match server.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                if let Err(close) = self.rooms.close("no local address").await {
                    tracing::debug!(error = %close, "room already stopped");
                }
                return Err(readyroom_transport::TransportError::AcceptFailed(e).into());
            }
        };
        let room = server.room().clone();
        let shutdown = server.shutdown_handle();
        let task = tokio::spawn(server.run());

        let settings = self.session_settings(&request, addr, room.capacity());
        let session_id = match self.directory.create(&self.identity.user_id, settings).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "session creation failed, closing room");
                stop_server(&shutdown, task, "session creation failed").await;
                return Err(e.into());
            }
        };
        if let Err(e) = room.assign_session(session_id.clone()).await {
            tracing::warn!(%session_id, error = %e, "session assignment failed, closing room");
            withdraw_session(&*self.directory, &session_id).await;
            stop_server(&shutdown, task, "session assignment failed").await;
            return Err(e.into());
        }

        tracing::info!(
            %session_id,
            %addr,
            name = %request.session_name,
            accessibility = %request.accessibility,
            "hosting session"
        );
        Ok(&*self.hosted.insert(HostSession {
            session_id,
            addr,
            room,
            shutdown,
            server: task,
        }))
    }

    /// Joins a listed session and connects to its host.
    ///
    /// # Errors
    /// [`DirectoryError::PasswordRequired`] for a private session without
    /// a password, before contacting the directory.
    pub async fn join_session(
        &mut self,
        session: &SessionSummary,
        password: Option<&str>,
    ) -> Result<&PeerSession, ReadyroomError> {
        self.ensure_idle().await?;

        let session_id = &session.session_id;
        if session.accessibility() == RoomAccessibility::Private
            && password.is_none_or(str::is_empty)
        {
            return Err(DirectoryError::PasswordRequired(session_id.clone()).into());
        }
        self.directory
            .join(session_id, &self.identity.user_id, password)
            .await?;

        let addr = session.host_address().ok_or_else(|| {
            DirectoryError::InvalidSettings(format!("session {session_id} has no host address"))
        })?;
        let peer = PeerSession::connect(addr, &self.identity, session.settings.max_players).await?;

        tracing::info!(%session_id, peer_id = %peer.peer_id(), "joined session");
        Ok(&*self.joined.insert(peer))
    }

    /// The hosted session, if this context hosts one.
    pub fn host(&self) -> Option<&HostSession> {
        self.hosted.as_ref()
    }

    /// The joined session, if this context joined one.
    pub fn peer(&self) -> Option<&PeerSession> {
        self.joined.as_ref()
    }

    /// Leaves the active session. A host withdraws its session from the
    /// directory and shuts its room down, which disconnects every peer;
    /// a peer just goes.
    pub async fn leave(&mut self) {
        if let Some(host) = self.hosted.take() {
            host.close(&*self.directory, "host left").await;
        }
        if let Some(peer) = self.joined.take() {
            peer.leave().await;
        }
    }

    /// Clears a finished session, or refuses if one is still live.
    async fn ensure_idle(&mut self) -> Result<(), ReadyroomError> {
        let live = self.hosted.as_ref().is_some_and(HostSession::is_live)
            || self.joined.as_ref().is_some_and(PeerSession::is_connected);
        if live {
            return Err(ReadyroomError::AlreadyActive);
        }
        self.leave().await;
        Ok(())
    }

    fn session_settings(
        &self,
        request: &HostRequest,
        addr: SocketAddr,
        max_players: usize,
    ) -> SessionSettings {
        let mut settings = BTreeMap::new();
        settings.insert(
            SessionSettings::SESSION_NAME.to_string(),
            request.session_name.clone(),
        );
        settings.insert(
            SessionSettings::ROOM_ACCESSIBILITY.to_string(),
            request.accessibility.to_string(),
        );
        settings.insert(SessionSettings::HOST_ADDRESS.to_string(), addr.to_string());
        settings.insert(GAME_VERSION.to_string(), self.config.game_version.clone());

        SessionSettings {
            mode: self.config.game_mode.clone(),
            map_name: self.config.map_name.clone(),
            max_players,
            current_players: 1,
            allow_join_in_progress: true,
            password: match request.accessibility {
                RoomAccessibility::Private => request.password.clone(),
                RoomAccessibility::Public => None,
            },
            settings,
        }
    }
}
