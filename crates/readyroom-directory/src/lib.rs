//! Session directory for readyroom.
//!
//! The directory is the remote service players browse to find rooms:
//! hosts publish a session record, peers list and join them, and the
//! host keeps the record's player list current as people come and go.
//!
//! 1. **Client contract**: the [`DirectoryClient`] trait
//! 2. **Records**: [`SessionSettings`], [`SessionSummary`], [`SessionFilter`]
//! 3. **Reference backend**: [`InMemoryDirectory`], a process-local
//!    directory used by the demo and the tests
//!
//! # How it fits in the stack
//!
//! ```text
//! Orchestrator (above)  ← creates/lists/joins sessions
//! Room actor (above)    ← registers/unregisters players, best effort
//!     ↕
//! Directory (this crate)
//!     ↕
//! Protocol (below)      ← provides UserId, SessionId
//! ```

mod client;
mod error;
mod memory;
mod settings;

pub use client::DirectoryClient;
pub use error::DirectoryError;
pub use memory::InMemoryDirectory;
pub use settings::{RoomAccessibility, SessionFilter, SessionSettings, SessionSummary};
