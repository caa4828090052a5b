//! The contract readyroom expects from a session directory backend.
//!
//! Readyroom doesn't ship a real backend; it talks to whatever implements
//! [`DirectoryClient`]. Every call is a request/response round trip that
//! may be slow or fail, so callers never hold room state across one.

use std::future::Future;

use readyroom_protocol::{SessionId, UserId};

use crate::{DirectoryError, SessionFilter, SessionSettings, SessionSummary};

/// A remote session directory.
///
/// `Send + Sync + 'static` because the host's room actor shares one
/// client (behind an `Arc`) with the tasks it spawns for registration.
///
/// # Example
///
/// ```rust
/// use readyroom_directory::{DirectoryClient, InMemoryDirectory, SessionFilter};
///
/// # async fn demo() {
/// let directory = InMemoryDirectory::new();
/// let sessions = directory.list(&SessionFilter::any()).await.unwrap();
/// assert!(sessions.is_empty());
/// # }
/// ```
pub trait DirectoryClient: Send + Sync + 'static {
    /// Publishes a new session hosted by `host`. Returns its id.
    fn create(
        &self,
        host: &UserId,
        settings: SessionSettings,
    ) -> impl Future<Output = Result<SessionId, DirectoryError>> + Send;

    /// Lists sessions matching `filter`.
    fn list(
        &self,
        filter: &SessionFilter,
    ) -> impl Future<Output = Result<Vec<SessionSummary>, DirectoryError>> + Send;

    /// Asks to join a session, checking password and capacity.
    ///
    /// Joining doesn't put the user on the player list; the host does
    /// that with [`register_player`](Self::register_player) once the
    /// peer shows up in the room.
    fn join(
        &self,
        session_id: &SessionId,
        user: &UserId,
        password: Option<&str>,
    ) -> impl Future<Output = Result<(), DirectoryError>> + Send;

    /// Fetches one session.
    fn get(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<SessionSummary, DirectoryError>> + Send;

    /// Adds `user` to the session's player list.
    fn register_player(
        &self,
        session_id: &SessionId,
        user: &UserId,
    ) -> impl Future<Output = Result<(), DirectoryError>> + Send;

    /// Removes `user` from the session's player list.
    fn unregister_player(
        &self,
        session_id: &SessionId,
        user: &UserId,
    ) -> impl Future<Output = Result<(), DirectoryError>> + Send;

    /// Withdraws a session. Called by its host when the room closes.
    fn remove_session(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<(), DirectoryError>> + Send;
}
