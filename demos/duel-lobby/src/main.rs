use std::sync::Arc;
use std::time::Duration;

use readyroom::prelude::*;

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

type Lobby = SessionOrchestrator<InMemoryDirectory>;

fn player(directory: &Arc<InMemoryDirectory>, user: &str, name: &str) -> Result<Lobby, ReadyroomError> {
    let identity = Identity::new(user, name)?;
    Ok(SessionOrchestrator::new(
        Arc::clone(directory),
        LobbyConfig::default(),
        identity,
    ))
}

/// Waits until `check` holds for the room. Fails with `step` if it
/// doesn't within a second.
async fn settle(
    mut view: tokio::sync::watch::Receiver<RoomSnapshot>,
    step: &str,
    check: impl Fn(&RoomSnapshot) -> bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let wait = view.wait_for(|state| check(state));
    match tokio::time::timeout(Duration::from_secs(1), wait).await {
        Ok(Ok(_)) => Ok(()),
        _ => Err(format!("lobby stalled: {step}").into()),
    }
}

fn print_roster(who: &str, state: &RoomSnapshot) {
    let names: Vec<String> = state
        .roster
        .iter()
        .map(|p| format!("{}{}", p.display_name, if p.is_ready { " (ready)" } else { "" }))
        .collect();
    tracing::info!(who, started = state.match_started, roster = ?names, "room");
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let directory = Arc::new(InMemoryDirectory::new());
    let mut hana = player(&directory, "user-hana", "Hana")?;
    let mut gus = player(&directory, "user-gus", "Gus")?;

    let session = hana.host_session(HostRequest::public("Friday duel")).await?;
    let room = session.room().clone();
    tracing::info!(session_id = %session.session_id(), addr = %session.local_addr(), "hosting");

    let listed = gus.find_sessions().await;
    let Some(summary) = listed.first() else {
        return Err("no sessions listed".into());
    };
    tracing::info!(
        name = summary.session_name().unwrap_or("?"),
        players = %summary.capacity_label(),
        "found session"
    );

    let peer = gus.join_session(summary, None).await?;
    settle(room.watch(), "peer joined", |s| s.roster.len() == 2).await?;

    peer.toggle_ready().await?;
    room.toggle_ready().await?;
    settle(room.watch(), "everyone ready", |s| s.roster.iter().all(|p| p.is_ready)).await?;
    print_roster("host", &room.snapshot());

    room.start_match().await?;
    settle(peer.watch(), "match started", |s| s.match_started).await?;
    print_roster("peer", &peer.snapshot());

    hana.leave().await;
    let view = gus.peer().map(PeerSession::watch).ok_or("peer gone")?;
    settle(view, "room closed", |s| s.roster.is_empty()).await?;
    gus.leave().await;
    Ok(())
}
