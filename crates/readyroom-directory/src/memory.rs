//! A process-local session directory.
//!
//! Behaves like a remote directory as far as callers can tell (async,
//! fallible, password and capacity checks) but keeps everything in a
//! map. The demo binary and the integration tests run against it.

use std::collections::BTreeMap;

use rand::Rng;
use readyroom_protocol::{SessionId, UserId};
use tokio::sync::Mutex;

use crate::{
    DirectoryClient, DirectoryError, RoomAccessibility, SessionFilter,
    SessionSettings, SessionSummary,
};

struct SessionRecord {
    host: UserId,
    settings: SessionSettings,
    players: Vec<UserId>,
}

impl SessionRecord {
    fn summary(&self, session_id: &SessionId) -> SessionSummary {
        let mut settings = self.settings.clone();
        settings.password = None;
        settings.current_players = self.players.len();
        SessionSummary {
            session_id: session_id.clone(),
            host_user_id: self.host.clone(),
            settings,
            players: self.players.clone(),
        }
    }

    fn is_full(&self) -> bool {
        self.players.len() >= self.settings.max_players
    }
}

/// In-memory [`DirectoryClient`].
///
/// The creating host counts as the session's first player.
#[derive(Default)]
pub struct InMemoryDirectory {
    /// Keyed by session id; a `BTreeMap` keeps listings stable.
    sessions: Mutex<BTreeMap<SessionId, SessionRecord>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of published sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

impl DirectoryClient for InMemoryDirectory {
    async fn create(
        &self,
        host: &UserId,
        settings: SessionSettings,
    ) -> Result<SessionId, DirectoryError> {
        if settings.max_players == 0 {
            return Err(DirectoryError::InvalidSettings(
                "max_players must be at least 1".into(),
            ));
        }
        if settings.accessibility() == RoomAccessibility::Private
            && settings.password.as_deref().is_none_or(str::is_empty)
        {
            return Err(DirectoryError::InvalidSettings(
                "private sessions need a password".into(),
            ));
        }

        let mut sessions = self.sessions.lock().await;
        let session_id = loop {
            let candidate = generate_session_id();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        sessions.insert(
            session_id.clone(),
            SessionRecord {
                host: host.clone(),
                settings,
                players: vec![host.clone()],
            },
        );

        tracing::info!(%session_id, %host, "session created");
        Ok(session_id)
    }

    async fn list(
        &self,
        filter: &SessionFilter,
    ) -> Result<Vec<SessionSummary>, DirectoryError> {
        let sessions = self.sessions.lock().await;
        Ok(sessions
            .iter()
            .map(|(id, record)| record.summary(id))
            .filter(|summary| filter.matches(summary))
            .collect())
    }

    async fn join(
        &self,
        session_id: &SessionId,
        user: &UserId,
        password: Option<&str>,
    ) -> Result<(), DirectoryError> {
        let sessions = self.sessions.lock().await;
        let record = sessions
            .get(session_id)
            .ok_or_else(|| DirectoryError::NotFound(session_id.clone()))?;

        if let Some(expected) = &record.settings.password {
            match password {
                None | Some("") => {
                    return Err(DirectoryError::PasswordRequired(
                        session_id.clone(),
                    ));
                }
                Some(given) if given != expected => {
                    return Err(DirectoryError::WrongPassword(
                        session_id.clone(),
                    ));
                }
                Some(_) => {}
            }
        }
        if record.is_full() && !record.players.contains(user) {
            return Err(DirectoryError::SessionFull(session_id.clone()));
        }

        tracing::debug!(%session_id, %user, "join accepted");
        Ok(())
    }

    async fn get(
        &self,
        session_id: &SessionId,
    ) -> Result<SessionSummary, DirectoryError> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(session_id)
            .map(|record| record.summary(session_id))
            .ok_or_else(|| DirectoryError::NotFound(session_id.clone()))
    }

    async fn register_player(
        &self,
        session_id: &SessionId,
        user: &UserId,
    ) -> Result<(), DirectoryError> {
        let mut sessions = self.sessions.lock().await;
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| DirectoryError::NotFound(session_id.clone()))?;

        if record.players.contains(user) {
            tracing::debug!(%session_id, %user, "player already registered");
            return Ok(());
        }
        if record.is_full() {
            return Err(DirectoryError::SessionFull(session_id.clone()));
        }
        record.players.push(user.clone());
        tracing::info!(
            %session_id,
            %user,
            players = record.players.len(),
            "player registered"
        );
        Ok(())
    }

    async fn unregister_player(
        &self,
        session_id: &SessionId,
        user: &UserId,
    ) -> Result<(), DirectoryError> {
        let mut sessions = self.sessions.lock().await;
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| DirectoryError::NotFound(session_id.clone()))?;

        let before = record.players.len();
        record.players.retain(|p| p != user);
        if record.players.len() == before {
            return Err(DirectoryError::NotRegistered(
                user.clone(),
                session_id.clone(),
            ));
        }
        tracing::info!(
            %session_id,
            %user,
            players = record.players.len(),
            "player unregistered"
        );
        Ok(())
    }

    async fn remove_session(&self, session_id: &SessionId) -> Result<(), DirectoryError> {
        let mut sessions = self.sessions.lock().await;
        let record = sessions
            .remove(session_id)
            .ok_or_else(|| DirectoryError::NotFound(session_id.clone()))?;
        tracing::info!(%session_id, host = %record.host, "session removed");
        Ok(())
    }
}

/// Generates a random 32-character hex session id (128 bits).
fn generate_session_id() -> SessionId {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    SessionId(bytes.iter().map(|b| format!("{b:02x}")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> UserId {
        UserId::new(s)
    }

    fn public_settings(name: &str) -> SessionSettings {
        SessionSettings {
            mode: "1vs1".into(),
            map_name: "default".into(),
            max_players: 2,
            current_players: 1,
            allow_join_in_progress: true,
            password: None,
            settings: [
                (SessionSettings::SESSION_NAME.to_string(), name.to_string()),
                (
                    SessionSettings::ROOM_ACCESSIBILITY.to_string(),
                    "public".to_string(),
                ),
            ]
            .into_iter()
            .collect(),
        }
    }

    fn private_settings(name: &str, password: &str) -> SessionSettings {
        let mut s = public_settings(name);
        s.password = Some(password.into());
        s.settings.insert(
            SessionSettings::ROOM_ACCESSIBILITY.to_string(),
            "private".to_string(),
        );
        s
    }

    // =====================================================================
    // create() / get() / list()
    // =====================================================================

    #[tokio::test]
    async fn test_create_returns_hex_id_and_host_is_first_player() {
        let dir = InMemoryDirectory::new();
        let id = dir.create(&uid("host"), public_settings("a")).await.unwrap();

        assert_eq!(id.as_str().len(), 32);
        let summary = dir.get(&id).await.unwrap();
        assert_eq!(summary.players, vec![uid("host")]);
        assert_eq!(summary.host_user_id, uid("host"));
        assert_eq!(summary.session_name(), Some("a"));
        assert_eq!(summary.capacity_label(), "1/2");
    }

    #[tokio::test]
    async fn test_create_private_without_password_is_invalid() {
        let dir = InMemoryDirectory::new();
        let mut s = private_settings("p", "");
        let result = dir.create(&uid("h"), s.clone()).await;
        assert!(matches!(result, Err(DirectoryError::InvalidSettings(_))));

        s.password = None;
        let result = dir.create(&uid("h"), s).await;
        assert!(matches!(result, Err(DirectoryError::InvalidSettings(_))));
    }

    #[tokio::test]
    async fn test_get_unknown_session_is_not_found() {
        let dir = InMemoryDirectory::new();
        let result = dir.get(&SessionId::new("nope")).await;
        assert!(matches!(result, Err(DirectoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_summary_hides_password() {
        let dir = InMemoryDirectory::new();
        let id = dir
            .create(&uid("h"), private_settings("p", "hunter2"))
            .await
            .unwrap();
        let summary = dir.get(&id).await.unwrap();
        assert_eq!(summary.settings.password, None);
        assert_eq!(summary.accessibility(), RoomAccessibility::Private);
    }

    #[tokio::test]
    async fn test_list_applies_filter() {
        let dir = InMemoryDirectory::new();
        dir.create(&uid("h1"), public_settings("a")).await.unwrap();
        let mut other = public_settings("b");
        other.mode = "2vs2".into();
        dir.create(&uid("h2"), other).await.unwrap();

        assert_eq!(dir.list(&SessionFilter::any()).await.unwrap().len(), 2);
        let duels = dir.list(&SessionFilter::with_mode("1vs1")).await.unwrap();
        assert_eq!(duels.len(), 1);
        assert_eq!(duels[0].session_name(), Some("a"));
    }

    // =====================================================================
    // join()
    // =====================================================================

    #[tokio::test]
    async fn test_join_public_session() {
        let dir = InMemoryDirectory::new();
        let id = dir.create(&uid("h"), public_settings("a")).await.unwrap();
        dir.join(&id, &uid("p"), None).await.expect("should join");
    }

    #[tokio::test]
    async fn test_join_private_checks_password() {
        let dir = InMemoryDirectory::new();
        let id = dir
            .create(&uid("h"), private_settings("p", "hunter2"))
            .await
            .unwrap();

        let missing = dir.join(&id, &uid("p"), None).await;
        assert!(matches!(missing, Err(DirectoryError::PasswordRequired(_))));

        let wrong = dir.join(&id, &uid("p"), Some("guess")).await;
        assert!(matches!(wrong, Err(DirectoryError::WrongPassword(_))));

        dir.join(&id, &uid("p"), Some("hunter2"))
            .await
            .expect("right password");
    }

    #[tokio::test]
    async fn test_join_full_session_is_rejected() {
        let dir = InMemoryDirectory::new();
        let id = dir.create(&uid("h"), public_settings("a")).await.unwrap();
        dir.register_player(&id, &uid("p1")).await.unwrap();

        let result = dir.join(&id, &uid("p2"), None).await;
        assert!(matches!(result, Err(DirectoryError::SessionFull(_))));
    }

    // =====================================================================
    // register_player() / unregister_player()
    // =====================================================================

    #[tokio::test]
    async fn test_register_then_unregister() {
        let dir = InMemoryDirectory::new();
        let id = dir.create(&uid("h"), public_settings("a")).await.unwrap();

        dir.register_player(&id, &uid("p")).await.unwrap();
        assert_eq!(dir.get(&id).await.unwrap().capacity_label(), "2/2");

        dir.unregister_player(&id, &uid("p")).await.unwrap();
        assert_eq!(dir.get(&id).await.unwrap().players, vec![uid("h")]);
    }

    #[tokio::test]
    async fn test_register_twice_is_idempotent() {
        let dir = InMemoryDirectory::new();
        let id = dir.create(&uid("h"), public_settings("a")).await.unwrap();
        dir.register_player(&id, &uid("p")).await.unwrap();
        dir.register_player(&id, &uid("p")).await.unwrap();
        assert_eq!(dir.get(&id).await.unwrap().players.len(), 2);
    }

    #[tokio::test]
    async fn test_unregister_unknown_player_is_error() {
        let dir = InMemoryDirectory::new();
        let id = dir.create(&uid("h"), public_settings("a")).await.unwrap();
        let result = dir.unregister_player(&id, &uid("ghost")).await;
        assert!(matches!(result, Err(DirectoryError::NotRegistered(_, _))));
    }

    #[tokio::test]
    async fn test_remove_session_drops_it_from_listing() {
        let dir = InMemoryDirectory::new();
        let id = dir.create(&uid("h"), public_settings("a")).await.unwrap();
        dir.remove_session(&id).await.unwrap();

        assert!(dir.list(&SessionFilter::any()).await.unwrap().is_empty());
        let join = dir.join(&id, &uid("p"), None).await;
        assert!(matches!(join, Err(DirectoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_unknown_session_is_not_found() {
        let dir = InMemoryDirectory::new();
        let result = dir.remove_session(&SessionId::new("missing")).await;
        assert!(matches!(result, Err(DirectoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_register_on_unknown_session_is_not_found() {
        let dir = InMemoryDirectory::new();
        let result = dir
            .register_player(&SessionId::new("missing"), &uid("p"))
            .await;
        assert!(matches!(result, Err(DirectoryError::NotFound(_))));
    }
}
