//! Room membership and match lifecycle for readyroom.
//!
//! The host owns the canonical room: who is in it, who is ready, and
//! whether the match has started. Peers hold a read-only replica fed by
//! the host's replication updates.
//!
//! # Key types
//!
//! - [`RoomMembershipEngine`]: pure host-side core; every operation
//!   returns the [`RoomEffect`]s its driver must carry out
//! - [`MatchLifecycleController`]: the Open/Started state machine
//! - [`RegistrationTracker`]: directory registrations per peer, including
//!   ones cancelled while still in flight
//! - [`RoomReplica`]: a replicated view that publishes [`RoomEvent`]s
//! - [`RoomHandle`]: talks to a running room actor
//! - [`RoomManager`]: one active room per context
//! - [`RoomConfig`]: capacity and start rules

mod config;
mod effect;
mod error;
mod lifecycle;
mod manager;
mod membership;
mod registration;
mod replica;
mod room;
mod roster;
mod token;

pub use config::{MatchPhase, RoomConfig};
pub use effect::RoomEffect;
pub use error::RoomError;
pub use lifecycle::MatchLifecycleController;
pub use manager::RoomManager;
pub use membership::RoomMembershipEngine;
pub use registration::{RegistrationOutcome, RegistrationTicket, RegistrationTracker};
pub use replica::{RoomEvent, RoomReplica, RoomSnapshot};
pub use room::{PeerSender, RoomHandle, RoomOutbound};
pub use roster::Roster;
pub use token::{HostToken, RoomId};
