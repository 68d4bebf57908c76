//! Catalogue Moe FM exposé à l'hôte ContentDirectory

use super::container::{Container, ContainerKind, EmptyPagePolicy};
use super::loader::PaginatedLoader;
use super::node::{CatalogNode, NodeIndex};
use super::playback::{PlaybackHandle, PlaybackSessions};
use super::sort_key::SortKeyAllocator;
use super::version::{DirectoryHost, VersionPropagator};
use super::ROOT_ID;
use crate::api::SignedApi;
use crate::api::playlist::PlaylistQuery;
use crate::config_ext::MoeFmConfigExt;
use crate::error::{MoeFmError, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Nom par défaut du serveur
pub const DEFAULT_CATALOG_NAME: &str = "Moe FM";
/// Titre par défaut de la playlist réapprovisionnée
pub const DEFAULT_PLAYLIST_TITLE: &str = "Start listening";
/// Titre par défaut de la playlist des favoris
pub const DEFAULT_FAVORITES_TITLE: &str = "Favorite songs";

/// Extrait l'identifiant de base d'un identifiant composite
///
/// La partie avant le premier `@`, puis avant le premier `.`.
///
/// ```
/// use moefm::parse_base_id;
///
/// assert_eq!(parse_base_id("track-42$root@browse.1"), "track-42$root");
/// assert_eq!(parse_base_id("1.meta"), "1");
/// ```
pub fn parse_base_id(id: &str) -> &str {
    let id = id.split_once('@').map_or(id, |(base, _)| base);
    id.split_once('.').map_or(id, |(base, _)| base)
}

/// Catalogue Moe FM
///
/// Clonable à moindre coût : toutes les copies partagent le même arbre.
#[derive(Clone, Debug)]
pub struct Catalog {
    inner: Arc<CatalogInner>,
}

#[derive(Debug)]
struct CatalogInner {
    root: Arc<Container>,
    index: Arc<NodeIndex>,
    propagator: Arc<VersionPropagator>,
    loader: Arc<PaginatedLoader>,
    sessions: PlaybackSessions,
}

impl Catalog {
    pub fn builder(api: Arc<dyn SignedApi>) -> CatalogBuilder {
        CatalogBuilder::new(api)
    }

    /// Construit le catalogue par défaut depuis la configuration globale
    pub fn from_config(api: Arc<dyn SignedApi>) -> Result<Self> {
        let config = moeconfig::get_config();
        Self::from_config_obj(api, config.as_ref())
    }

    /// Construit le catalogue par défaut depuis un objet Config spécifique
    ///
    /// Deux playlists sous la racine : l'écoute continue (réapprovisionnée)
    /// et les morceaux favoris (chargés une fois).
    pub fn from_config_obj(api: Arc<dyn SignedApi>, config: &moeconfig::Config) -> Result<Self> {
        let per_page = config.get_moefm_tracks_per_request()?;
        let min_tracks = config.get_moefm_min_tracks()?;
        let empty_pages = config.get_moefm_empty_page_policy()?;

        let catalog = Self::builder(api)
            .name(config.get_moefm_catalog_title("name", DEFAULT_CATALOG_NAME)?)
            .replenishing(
                config.get_moefm_catalog_title("playlist_title", DEFAULT_PLAYLIST_TITLE)?,
                PlaylistQuery::with_per_page(per_page),
                min_tracks,
                empty_pages,
            )
            .standard(
                config.get_moefm_catalog_title("favorites_title", DEFAULT_FAVORITES_TITLE)?,
                PlaylistQuery::with_per_page(per_page).param("fav", "song"),
            )
            .build();

        info!(min_tracks, per_page, "Moe FM catalog configured");
        Ok(catalog)
    }

    /// Branche l'hôte et lance le pré-remplissage des playlists réapprovisionnées
    ///
    /// Doit être appelé depuis un runtime tokio. Les erreurs de remplissage
    /// sont journalisées ; le prochain accès retentera.
    pub fn initialize(&self, host: Arc<dyn DirectoryHost>) -> JoinHandle<()> {
        self.inner.propagator.attach(host);

        let catalog = self.clone();
        tokio::spawn(async move {
            for container in catalog.containers() {
                if !container.is_replenishing() {
                    continue;
                }
                if let Err(err) = container.ensure_loaded(&catalog.inner.loader).await {
                    warn!(
                        container_id = container.id(),
                        error = %err,
                        "Initial playlist fill failed"
                    );
                }
            }
        })
    }

    pub fn name(&self) -> &str {
        self.inner.root.name()
    }

    pub fn root(&self) -> &Arc<Container> {
        &self.inner.root
    }

    /// Conteneurs directement sous la racine
    pub fn containers(&self) -> Vec<Arc<Container>> {
        self.inner
            .root
            .children()
            .into_iter()
            .filter_map(|node| node.as_container().cloned())
            .collect()
    }

    pub fn system_update_id(&self) -> u32 {
        self.inner.propagator.system_update_id()
    }

    pub fn loader(&self) -> &Arc<PaginatedLoader> {
        &self.inner.loader
    }

    /// Conteneur désigné par `id` (identifiant composite accepté)
    pub fn get_container(&self, id: &str) -> Result<Arc<Container>> {
        let node = self
            .get_by_id(id)
            .ok_or_else(|| MoeFmError::NotFound(id.to_string()))?;
        node.as_container()
            .cloned()
            .ok_or_else(|| MoeFmError::NotAContainer(id.to_string()))
    }

    /// Enfants d'un conteneur, après chargement si nécessaire
    ///
    /// Si le chargement échoue alors que le conteneur a déjà des enfants,
    /// ceux-ci sont renvoyés ; sinon l'erreur est remontée.
    pub async fn get_children(&self, container_id: &str) -> Result<Vec<CatalogNode>> {
        let container = self.get_container(container_id)?;

        if let Err(err) = container.ensure_loaded(&self.inner.loader).await {
            if container.child_count() == 0 {
                return Err(err);
            }
            warn!(
                container_id = container.id(),
                error = %err,
                "Serving current children after a failed load"
            );
        }

        Ok(container.children())
    }

    /// Noeud désigné par `node_id`
    ///
    /// Un morceau déjà retiré de son conteneur reste accessible.
    pub fn get_item(&self, node_id: &str) -> Result<CatalogNode> {
        self.inner
            .index
            .get(node_id)
            .or_else(|| self.get_by_id(node_id))
            .ok_or_else(|| MoeFmError::NotFound(node_id.to_string()))
    }

    /// Recherche par identifiant, éventuellement composite
    pub fn get_by_id(&self, id: &str) -> Option<CatalogNode> {
        let base = parse_base_id(id);
        let node = self.inner.index.get(base);
        if node.is_none() {
            debug!(id, base, "get_by_id: unknown id");
        }
        node
    }

    /// Démarre la lecture d'un morceau
    ///
    /// La poignée est rendue immédiatement ; la validation (rapport d'écoute
    /// puis éviction) est planifiée à mi-durée.
    pub fn start_playback(&self, track_id: &str) -> Result<PlaybackHandle> {
        let track = self
            .get_by_id(track_id)
            .ok_or_else(|| MoeFmError::NotFound(track_id.to_string()))?
            .as_track()
            .cloned()
            .ok_or_else(|| MoeFmError::NotATrack(track_id.to_string()))?;

        let container = self.get_container(track.parent_id())?;
        Ok(self.inner.sessions.start(container, track))
    }

    /// Dernière session en attente de validation pour un conteneur
    pub fn last_session(&self, container_id: &str) -> u64 {
        self.inner.sessions.last_session(container_id)
    }
}

struct ContainerSpec {
    title: String,
    kind: ContainerKind,
    query: PlaylistQuery,
}

/// Construction explicite de l'arbre
pub struct CatalogBuilder {
    api: Arc<dyn SignedApi>,
    name: String,
    containers: Vec<ContainerSpec>,
}

impl CatalogBuilder {
    pub fn new(api: Arc<dyn SignedApi>) -> Self {
        Self {
            api,
            name: DEFAULT_CATALOG_NAME.to_string(),
            containers: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Ajoute une playlist maintenue à `min_tracks` morceaux
    pub fn replenishing(
        mut self,
        title: impl Into<String>,
        query: PlaylistQuery,
        min_tracks: usize,
        empty_pages: EmptyPagePolicy,
    ) -> Self {
        self.containers.push(ContainerSpec {
            title: title.into(),
            kind: ContainerKind::Replenishing {
                min_tracks,
                empty_pages,
            },
            query,
        });
        self
    }

    /// Ajoute une playlist chargée une seule fois
    pub fn standard(mut self, title: impl Into<String>, query: PlaylistQuery) -> Self {
        self.containers.push(ContainerSpec {
            title: title.into(),
            kind: ContainerKind::Standard,
            query,
        });
        self
    }

    /// Les conteneurs reçoivent les identifiants `1`, `2`, ... dans l'ordre d'ajout
    pub fn build(self) -> Catalog {
        let propagator = Arc::new(VersionPropagator::new());
        let sort_keys = Arc::new(SortKeyAllocator::new());
        let index = Arc::new(NodeIndex::new());
        let loader = Arc::new(PaginatedLoader::new(
            self.api,
            sort_keys.clone(),
            index.clone(),
        ));

        let root = Arc::new(Container::new(
            ROOT_ID,
            None,
            self.name,
            0,
            ContainerKind::Root,
            None,
            propagator.clone(),
        ));
        index.insert_container(root.clone());

        for (position, spec) in self.containers.into_iter().enumerate() {
            let container = Arc::new(Container::new(
                (position + 1).to_string(),
                Some(ROOT_ID),
                spec.title,
                sort_keys.next(),
                spec.kind,
                Some(spec.query),
                propagator.clone(),
            ));
            root.push_initial(CatalogNode::Container(container.clone()));
            index.insert_container(container);
        }

        Catalog {
            inner: Arc::new(CatalogInner {
                root,
                index,
                propagator,
                sessions: PlaybackSessions::new(loader.clone()),
                loader,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LoadState;
    use async_trait::async_trait;
    use serde_json::Value;

    struct OfflineApi;

    #[async_trait]
    impl SignedApi for OfflineApi {
        async fn get_json(&self, _endpoint: &str, _params: &[(String, String)]) -> Result<Value> {
            Err(MoeFmError::Unauthorized("offline".into()))
        }
    }

    fn catalog() -> Catalog {
        Catalog::builder(Arc::new(OfflineApi))
            .replenishing(
                "Start listening",
                PlaylistQuery::with_per_page(2),
                2,
                EmptyPagePolicy::default(),
            )
            .standard("Favorite songs", PlaylistQuery::default().param("fav", "song"))
            .build()
    }

    #[test]
    fn test_parse_base_id() {
        assert_eq!(parse_base_id("track-42$root@browse.1"), "track-42$root");
        assert_eq!(parse_base_id("track-42$1"), "track-42$1");
        assert_eq!(parse_base_id("0@x"), "0");
        assert_eq!(parse_base_id("1.2@3"), "1");
        assert_eq!(parse_base_id(""), "");
    }

    #[test]
    fn test_tree_layout() {
        let catalog = catalog();
        assert_eq!(catalog.root().id(), ROOT_ID);
        assert_eq!(catalog.name(), DEFAULT_CATALOG_NAME);

        let containers = catalog.containers();
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].id(), "1");
        assert!(containers[0].is_replenishing());
        assert_eq!(containers[1].id(), "2");
        assert_eq!(containers[1].parent_id(), Some(ROOT_ID));

        // Construction sans mutation publiée
        assert_eq!(catalog.system_update_id(), 0);
        assert_eq!(catalog.root().update_id(), 0);
    }

    #[test]
    fn test_lookup_errors() {
        let catalog = catalog();
        assert!(matches!(
            catalog.get_item("nope"),
            Err(MoeFmError::NotFound(_))
        ));
        assert!(matches!(
            catalog.start_playback("1"),
            Err(MoeFmError::NotATrack(_))
        ));
        assert!(catalog.get_by_id("1@browse").is_some());
    }

    #[tokio::test]
    async fn test_failed_first_load_is_reported() {
        let catalog = catalog();
        let err = catalog.get_children("2").await.unwrap_err();
        assert!(err.is_auth_error());

        let favorites = catalog.get_container("2").unwrap();
        assert_eq!(favorites.update_id(), 0);
        assert_eq!(favorites.state(), LoadState::NotLoaded);
    }

    #[tokio::test]
    async fn test_root_children_need_no_fetch() {
        let catalog = catalog();
        let children = catalog.get_children(ROOT_ID).await.unwrap();
        let names: Vec<&str> = children.iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["Start listening", "Favorite songs"]);
    }
}
