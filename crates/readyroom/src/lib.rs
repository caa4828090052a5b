//! # Readyroom
//!
//! A host-authoritative ready-up lobby for peer-to-peer matches.
//!
//! One player hosts a room and publishes it to a session directory;
//! others browse the directory, join, and toggle readiness; the host
//! starts the match. The host owns the room state and replicates every
//! change to its peers over a reliable ordered channel.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use readyroom::prelude::*;
//!
//! # async fn demo() -> Result<(), ReadyroomError> {
//! let directory = Arc::new(InMemoryDirectory::new());
//! let identity = Identity::new("user-1", "Ann")?;
//! let mut lobby = SessionOrchestrator::new(directory, LobbyConfig::default(), identity);
//!
//! let host = lobby.host_session(HostRequest::public("Friday duel")).await?;
//! host.start_match().await?;
//! lobby.leave().await;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod handler;
mod logging;
mod orchestrator;
mod server;
mod wire;

pub use client::PeerSession;
pub use config::LobbyConfig;
pub use error::ReadyroomError;
pub use logging::init_tracing;
pub use orchestrator::{HostRequest, HostSession, SessionOrchestrator};
pub use server::{HostServer, HostServerBuilder, ShutdownHandle};

pub mod prelude {
    //! Everything a lobby needs in one import.

    pub use crate::{
        init_tracing, HostRequest, HostServer, HostServerBuilder, HostSession, LobbyConfig,
        PeerSession, ReadyroomError, SessionOrchestrator, ShutdownHandle,
    };
    pub use readyroom_directory::{
        DirectoryClient, DirectoryError, InMemoryDirectory, RoomAccessibility, SessionFilter,
        SessionSettings, SessionSummary,
    };
    pub use readyroom_protocol::{
        Identity, PeerId, PlayerInfo, Replication, RoomRequest, RosterChange, SessionId,
        UserId,
    };
    pub use readyroom_room::{
        MatchPhase, RoomConfig, RoomError, RoomEvent, RoomHandle, RoomManager, RoomSnapshot,
    };
}
