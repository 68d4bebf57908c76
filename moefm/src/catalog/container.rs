//! Conteneurs du catalogue et leur machine à états de chargement
//!
//! Un conteneur passe par `NotLoaded → Loading → Loaded`. L'entrée dans
//! `Loading` exige de détenir la porte de chargement (un `tokio::sync::Mutex`) :
//! les appelants concurrents attendent sur la porte puis constatent que le
//! chargement a eu lieu, sans relancer de requête.
//!
//! - Un conteneur **standard** charge une seule page ; `Loaded` est terminal.
//! - Un conteneur **réapprovisionné** enchaîne les pages tant que le nombre de
//!   morceaux est sous le minimum, et redemande un chargement dès qu'un retrait
//!   le fait repasser sous ce seuil.

use super::loader::PaginatedLoader;
use super::node::CatalogNode;
use super::version::VersionPropagator;
use crate::api::playlist::PlaylistQuery;
use crate::error::Result;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// État de chargement d'un conteneur
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Loading,
    Loaded,
}

/// Politique appliquée quand une page revient vide
///
/// Après `max_retries` nouvelles tentatives vides, espacées de `backoff`,
/// le cycle de réapprovisionnement s'arrête sur un remplissage partiel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyPagePolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for EmptyPagePolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::from_millis(1000),
        }
    }
}

/// Nature d'un conteneur
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Racine : ses enfants sont fixés à la construction
    Root,
    /// Playlist fixe, chargée une seule fois
    Standard,
    /// Playlist maintenue à `min_tracks` morceaux au moins
    Replenishing {
        min_tracks: usize,
        empty_pages: EmptyPagePolicy,
    },
}

/// Conteneur de l'arbre
pub struct Container {
    id: String,
    parent_id: Option<String>,
    name: String,
    sort_key: u64,
    kind: ContainerKind,
    query: PlaylistQuery,
    children: Mutex<Vec<CatalogNode>>,
    /// Sérialise les mutations : liste, compteurs et notification
    mutation: Mutex<()>,
    update_id: AtomicU32,
    state: Mutex<LoadState>,
    /// Nombre de cycles de chargement terminés avec succès
    load_generation: AtomicU64,
    /// Le dernier cycle s'est arrêté sur une page vide
    last_cycle_partial: AtomicBool,
    gate: tokio::sync::Mutex<()>,
    propagator: Arc<VersionPropagator>,
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .field("children", &self.child_count())
            .field("update_id", &self.update_id())
            .finish()
    }
}

impl Container {
    pub fn new(
        id: impl Into<String>,
        parent_id: Option<&str>,
        name: impl Into<String>,
        sort_key: u64,
        kind: ContainerKind,
        query: Option<PlaylistQuery>,
        propagator: Arc<VersionPropagator>,
    ) -> Self {
        let state = match kind {
            ContainerKind::Root => LoadState::Loaded,
            _ => LoadState::NotLoaded,
        };

        Self {
            id: id.into(),
            parent_id: parent_id.map(str::to_string),
            name: name.into(),
            sort_key,
            kind,
            query: query.unwrap_or_default(),
            children: Mutex::new(Vec::new()),
            mutation: Mutex::new(()),
            update_id: AtomicU32::new(0),
            state: Mutex::new(state),
            load_generation: AtomicU64::new(0),
            last_cycle_partial: AtomicBool::new(false),
            gate: tokio::sync::Mutex::new(()),
            propagator,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sort_key(&self) -> u64 {
        self.sort_key
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn is_replenishing(&self) -> bool {
        matches!(self.kind, ContainerKind::Replenishing { .. })
    }

    /// Paramètres de requête propres à ce conteneur
    pub fn query(&self) -> &PlaylistQuery {
        &self.query
    }

    pub fn update_id(&self) -> u32 {
        self.update_id.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> LoadState {
        *self.lock_state()
    }

    pub fn child_count(&self) -> usize {
        self.lock_children().len()
    }

    /// Copie des enfants, triée par clé de tri croissante
    pub fn children(&self) -> Vec<CatalogNode> {
        self.lock_children().clone()
    }

    /// Indique si un accès doit déclencher un chargement
    pub fn needs_load(&self) -> bool {
        match self.kind {
            ContainerKind::Root => false,
            ContainerKind::Standard => self.state() != LoadState::Loaded,
            ContainerKind::Replenishing { min_tracks, .. } => {
                self.state() != LoadState::Loaded || self.child_count() < min_tracks
            }
        }
    }

    /// Ajoute un enfant (une mutation)
    pub fn add_child(&self, node: CatalogNode) {
        self.add_children(vec![node]);
    }

    /// Ajoute un lot d'enfants en une seule mutation
    ///
    /// Retourne `false` (sans mutation) si le lot est vide. L'hôte reçoit les
    /// notifications d'un même conteneur dans l'ordre des `update_id`.
    pub fn add_children(&self, nodes: Vec<CatalogNode>) -> bool {
        if nodes.is_empty() {
            return false;
        }

        let _mutation = self.lock_mutation();
        {
            let mut children = self.lock_children();
            for node in nodes {
                insert_sorted(&mut children, node);
            }
        }

        self.propagator.on_mutation(self);
        true
    }

    /// Retire l'enfant `id`
    ///
    /// Sans effet (et sans mutation) si l'enfant est absent.
    pub fn remove_child(&self, id: &str) -> bool {
        let _mutation = self.lock_mutation();
        let removed = {
            let mut children = self.lock_children();
            match children.iter().position(|c| c.id() == id) {
                Some(pos) => {
                    children.remove(pos);
                    true
                }
                None => false,
            }
        };

        if removed {
            self.propagator.on_mutation(self);
        } else {
            debug!(container_id = %self.id, child_id = id, "Child already removed");
        }
        removed
    }

    /// Ajoute un enfant à la construction de l'arbre, sans mutation publiée
    pub(crate) fn push_initial(&self, node: CatalogNode) {
        insert_sorted(&mut self.lock_children(), node);
    }

    pub(crate) fn bump_update_id(&self) -> u32 {
        self.update_id.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }

    /// Charge le conteneur si nécessaire
    ///
    /// Un seul cycle de chargement s'exécute à la fois ; les appelants
    /// concurrents attendent sa fin et n'en relancent pas un second. En cas
    /// d'échec, l'état antérieur est restauré et l'erreur est remontée :
    /// l'accès suivant retentera.
    pub async fn ensure_loaded(&self, loader: &PaginatedLoader) -> Result<()> {
        if !self.needs_load() {
            return Ok(());
        }

        let generation = self.load_generation.load(Ordering::Acquire);
        let _gate = self.gate.lock().await;

        if !self.needs_load() {
            debug!(container_id = %self.id, "Load completed by a concurrent caller");
            return Ok(());
        }

        // Un cycle concurrent arrêté sur une page vide n'est pas relancé ;
        // un retrait survenu après un cycle complet l'est.
        let completed_concurrently = self.load_generation.load(Ordering::Acquire) != generation;
        if completed_concurrently && self.last_cycle_partial.load(Ordering::Acquire) {
            debug!(container_id = %self.id, "Concurrent cycle ended on an empty page");
            return Ok(());
        }

        let loading = LoadingGuard::enter(self);

        let result = match self.kind {
            ContainerKind::Root => Ok(()),
            ContainerKind::Standard => loader.load(self).await.map(|_| ()),
            ContainerKind::Replenishing {
                min_tracks,
                empty_pages,
            } => self.replenish(loader, min_tracks, empty_pages).await,
        };

        match result {
            Ok(()) => {
                loading.complete();
                self.load_generation.fetch_add(1, Ordering::Release);
                debug!(
                    container_id = %self.id,
                    children = self.child_count(),
                    update_id = self.update_id(),
                    "Container loaded"
                );
                Ok(())
            }
            Err(err) => {
                warn!(container_id = %self.id, error = %err, "Failed to load container");
                Err(err)
            }
        }
    }

    /// Enchaîne les pages jusqu'à atteindre `min_tracks`
    async fn replenish(
        &self,
        loader: &PaginatedLoader,
        min_tracks: usize,
        policy: EmptyPagePolicy,
    ) -> Result<()> {
        let mut empty_pages = 0u32;
        self.last_cycle_partial.store(false, Ordering::Release);

        while self.child_count() < min_tracks {
            debug!(
                container_id = %self.id,
                children = self.child_count(),
                min_tracks,
                "Filling playlist..."
            );

            let added = loader.load(self).await?;
            if !added.is_empty() {
                empty_pages = 0;
                continue;
            }

            if empty_pages >= policy.max_retries {
                info!(
                    container_id = %self.id,
                    children = self.child_count(),
                    min_tracks,
                    "Remote returned an empty page, stopping with a partial fill"
                );
                self.last_cycle_partial.store(true, Ordering::Release);
                break;
            }

            empty_pages += 1;
            tokio::time::sleep(policy.backoff).await;
        }

        Ok(())
    }

    fn set_state(&self, state: LoadState) -> LoadState {
        std::mem::replace(&mut *self.lock_state(), state)
    }

    fn lock_state(&self) -> MutexGuard<'_, LoadState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_mutation(&self) -> MutexGuard<'_, ()> {
        self.mutation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_children(&self) -> MutexGuard<'_, Vec<CatalogNode>> {
        self.children
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn insert_sorted(children: &mut Vec<CatalogNode>, node: CatalogNode) {
    let key = node.sort_key();
    let pos = children.partition_point(|c| c.sort_key() <= key);
    children.insert(pos, node);
}

/// Maintient l'état `Loading` le temps d'un cycle
///
/// Abandonné sans [`complete`](Self::complete) (erreur ou future annulée),
/// il restaure l'état antérieur.
struct LoadingGuard<'a> {
    container: &'a Container,
    previous: LoadState,
    completed: bool,
}

impl<'a> LoadingGuard<'a> {
    fn enter(container: &'a Container) -> Self {
        let previous = container.set_state(LoadState::Loading);
        Self {
            container,
            previous,
            completed: false,
        }
    }

    fn complete(mut self) {
        self.completed = true;
        self.container.set_state(LoadState::Loaded);
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.container.set_state(self.previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::node::NodeIndex;
    use crate::catalog::version::{ContainerUpdate, DirectoryHost, NotificationError};
    use std::sync::atomic::AtomicUsize;

    fn container(kind: ContainerKind) -> (Arc<VersionPropagator>, Container) {
        let propagator = Arc::new(VersionPropagator::new());
        let c = Container::new("1", Some("0"), "Test", 1, kind, None, propagator.clone());
        (propagator, c)
    }

    fn track(index: &NodeIndex, sub_id: &str, sort_key: u64) -> CatalogNode {
        let metadata = crate::catalog::track::TrackMetadata {
            sub_id: sub_id.into(),
            title: sub_id.into(),
            original_track_number: None,
            artist: String::new(),
            album: String::new(),
            cover_url: None,
            duration: "0:01:00".into(),
            duration_seconds: 60,
            stream_locator: format!("http://stream/{}", sub_id),
            file_size_bytes: 0,
        };
        CatalogNode::Track(index.insert_track("1", sort_key, metadata))
    }

    #[test]
    fn test_initial_states() {
        let (_, root) = container(ContainerKind::Root);
        assert_eq!(root.state(), LoadState::Loaded);
        assert!(!root.needs_load());

        let (_, standard) = container(ContainerKind::Standard);
        assert_eq!(standard.state(), LoadState::NotLoaded);
        assert!(standard.needs_load());
    }

    #[test]
    fn test_batch_is_one_mutation_and_ordered() {
        let (propagator, c) = container(ContainerKind::Standard);
        let index = NodeIndex::new();

        assert!(c.add_children(vec![track(&index, "b", 5), track(&index, "a", 2)]));
        c.add_child(track(&index, "c", 3));

        let keys: Vec<u64> = c.children().iter().map(|n| n.sort_key()).collect();
        assert_eq!(keys, vec![2, 3, 5]);
        assert_eq!(c.update_id(), 2);
        assert_eq!(propagator.system_update_id(), 2);
    }

    #[test]
    fn test_empty_batch_is_not_a_mutation() {
        let (_, c) = container(ContainerKind::Standard);
        assert!(!c.add_children(Vec::new()));
        assert_eq!(c.update_id(), 0);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (_, c) = container(ContainerKind::Standard);
        let index = NodeIndex::new();
        c.add_child(track(&index, "a", 1));

        assert!(c.remove_child("track-a$1"));
        assert_eq!(c.update_id(), 2);

        assert!(!c.remove_child("track-a$1"));
        assert!(!c.remove_child("unknown"));
        assert_eq!(c.update_id(), 2);
        assert_eq!(c.child_count(), 0);
    }

    #[test]
    fn test_replenishing_needs_load_below_minimum() {
        let (_, c) = container(ContainerKind::Replenishing {
            min_tracks: 2,
            empty_pages: EmptyPagePolicy::default(),
        });
        let index = NodeIndex::new();
        c.set_state(LoadState::Loaded);
        c.add_child(track(&index, "a", 1));
        assert!(c.needs_load());

        c.add_child(track(&index, "b", 2));
        assert!(!c.needs_load());
    }

    /// Records updates, stalling inside the first notification
    #[derive(Default)]
    struct SlowHost {
        calls: AtomicUsize,
        updates: Mutex<Vec<(u32, u32)>>,
    }

    impl DirectoryHost for SlowHost {
        fn container_updated(&self, update: &ContainerUpdate) -> std::result::Result<(), NotificationError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 1 {
                std::thread::sleep(Duration::from_millis(200));
            }
            self.updates
                .lock()
                .unwrap()
                .push((update.system_update_id, update.container_update_id));
            Ok(())
        }
    }

    #[test]
    fn test_concurrent_mutations_notify_in_order() {
        let (propagator, c) = container(ContainerKind::Standard);
        let host = Arc::new(SlowHost::default());
        propagator.attach(host.clone());
        let index = NodeIndex::new();
        c.add_child(track(&index, "b", 1));
        let a = track(&index, "a", 2);

        std::thread::scope(|scope| {
            scope.spawn(|| c.add_children(vec![a]));
            scope.spawn(|| {
                std::thread::sleep(Duration::from_millis(50));
                c.remove_child("track-b$1")
            });
        });

        let updates = host.updates.lock().unwrap().clone();
        assert_eq!(updates, vec![(1, 1), (2, 2), (3, 3)]);
        assert_eq!(c.update_id(), 3);
    }

    #[test]
    fn test_loading_guard_restores_previous_state() {
        let (_, c) = container(ContainerKind::Standard);
        {
            let _guard = LoadingGuard::enter(&c);
            assert_eq!(c.state(), LoadState::Loading);
        }
        assert_eq!(c.state(), LoadState::NotLoaded);

        LoadingGuard::enter(&c).complete();
        assert_eq!(c.state(), LoadState::Loaded);
    }
}
