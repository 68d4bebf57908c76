//! Sessions de lecture
//!
//! Le rendu d'un flux démarre immédiatement. À mi-durée du morceau, la
//! session est *validée* : l'écoute est signalée à Moe FM et, pour un
//! conteneur réapprovisionné, le morceau est retiré puis le conteneur
//! rechargé. Seule la dernière session démarrée pour un conteneur est
//! validée.

use super::container::Container;
use super::loader::PaginatedLoader;
use super::track::Track;
use crate::api::SignedApi;
use crate::api::listen::report_listen;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Issue de la validation d'une session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Écoute signalée ; `evicted` indique si le morceau a été retiré
    Committed { evicted: bool },
    /// Une session plus récente a démarré sur le même conteneur
    Superseded,
}

/// Poignée rendue au proxy de flux
#[derive(Debug)]
pub struct PlaybackHandle {
    pub session_id: u64,
    pub track: Arc<Track>,
    /// URL distante à relayer
    pub locator: String,
    /// Tâche de validation différée
    pub commit: JoinHandle<CommitOutcome>,
}

/// Registre des sessions, une case « dernière session » par conteneur
pub struct PlaybackSessions {
    next_session: AtomicU64,
    last_played: Mutex<HashMap<String, Arc<AtomicU64>>>,
    loader: Arc<PaginatedLoader>,
}

impl std::fmt::Debug for PlaybackSessions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSessions")
            .field("next_session", &self.next_session.load(Ordering::Relaxed))
            .finish()
    }
}

impl PlaybackSessions {
    pub fn new(loader: Arc<PaginatedLoader>) -> Self {
        Self {
            next_session: AtomicU64::new(1),
            last_played: Mutex::new(HashMap::new()),
            loader,
        }
    }

    /// Démarre une session pour `track`, rangé dans `container`
    ///
    /// Doit être appelé depuis un runtime tokio.
    pub fn start(&self, container: Arc<Container>, track: Arc<Track>) -> PlaybackHandle {
        let session_id = self.next_session.fetch_add(1, Ordering::SeqCst);
        let slot = self.slot(container.id());
        claim_slot(&slot, session_id);

        let delay = commit_delay(track.duration_seconds());
        info!(
            session_id,
            track_id = track.id(),
            delay_ms = delay.as_millis() as u64,
            "Playback started"
        );

        let commit = tokio::spawn(commit_after(
            delay,
            session_id,
            slot,
            self.loader.clone(),
            container,
            track.clone(),
        ));

        PlaybackHandle {
            session_id,
            locator: track.stream_locator().to_string(),
            track,
            commit,
        }
    }

    /// Dernière session démarrée pour `container_id` (0 si aucune en attente)
    pub fn last_session(&self, container_id: &str) -> u64 {
        self.slot(container_id).load(Ordering::SeqCst)
    }

    fn slot(&self, container_id: &str) -> Arc<AtomicU64> {
        let mut slots = self
            .last_played
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slots
            .entry(container_id.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .clone()
    }
}

/// Réserve la case pour `session_id`, sauf si une session plus récente la tient
fn claim_slot(slot: &AtomicU64, session_id: u64) {
    slot.fetch_max(session_id, Ordering::SeqCst);
}

/// Délai de validation : la moitié de la durée déclarée
pub fn commit_delay(duration_seconds: u64) -> Duration {
    Duration::from_millis(duration_seconds.saturating_mul(500))
}

async fn commit_after(
    delay: Duration,
    session_id: u64,
    slot: Arc<AtomicU64>,
    loader: Arc<PaginatedLoader>,
    container: Arc<Container>,
    track: Arc<Track>,
) -> CommitOutcome {
    tokio::time::sleep(delay).await;

    if slot
        .compare_exchange(session_id, 0, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        debug!(
            session_id,
            track_id = track.id(),
            "Newer session started, skipping commit"
        );
        return CommitOutcome::Superseded;
    }

    spawn_listen_report(loader.api().clone(), track.sub_id().to_string());

    if !container.is_replenishing() {
        return CommitOutcome::Committed { evicted: false };
    }

    let evicted = container.remove_child(track.id());
    if let Err(err) = container.ensure_loaded(&loader).await {
        warn!(
            container_id = container.id(),
            error = %err,
            "Failed to refill playlist after playback"
        );
    }

    CommitOutcome::Committed { evicted }
}

fn spawn_listen_report(api: Arc<dyn SignedApi>, sub_id: String) {
    tokio::spawn(async move {
        if let Err(err) = report_listen(api.as_ref(), &sub_id).await {
            warn!(sub_id = %sub_id, error = %err, "Unable to log listen");
        }
    });
}
