//! Chargement d'une page de playlist dans un conteneur

use super::container::Container;
use super::node::{CatalogNode, NodeIndex};
use super::sort_key::SortKeyAllocator;
use super::track::{Track, TrackMetadata};
use crate::api::SignedApi;
use crate::api::playlist::fetch_playlist_page;
use crate::error::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Récupère une page, la convertit en morceaux et la fusionne
///
/// La page entière est décodée avant toute mutation : une entrée invalide
/// fait échouer la page sans rien fusionner.
pub struct PaginatedLoader {
    api: Arc<dyn SignedApi>,
    sort_keys: Arc<SortKeyAllocator>,
    index: Arc<NodeIndex>,
}

impl std::fmt::Debug for PaginatedLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginatedLoader")
            .field("last_sort_key", &self.sort_keys.last())
            .field("indexed_nodes", &self.index.len())
            .finish()
    }
}

impl PaginatedLoader {
    pub fn new(
        api: Arc<dyn SignedApi>,
        sort_keys: Arc<SortKeyAllocator>,
        index: Arc<NodeIndex>,
    ) -> Self {
        Self {
            api,
            sort_keys,
            index,
        }
    }

    pub fn api(&self) -> &Arc<dyn SignedApi> {
        &self.api
    }

    /// Charge une page dans `container`
    ///
    /// Les morceaux sont ajoutés dans l'ordre de la page, chacun avec une
    /// clé de tri neuve, en une seule mutation. Une page vide n'est pas une
    /// erreur : elle ne produit aucun morceau et aucune mutation.
    pub async fn load(&self, container: &Container) -> Result<Vec<Arc<Track>>> {
        let entries = fetch_playlist_page(self.api.as_ref(), container.query()).await?;
        info!(container_id = container.id(), entries = entries.len(), "got playlist");

        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let metadata = entries
            .iter()
            .map(TrackMetadata::try_from)
            .collect::<Result<Vec<_>>>()?;

        let tracks: Vec<Arc<Track>> = metadata
            .into_iter()
            .map(|meta| {
                self.index
                    .insert_track(container.id(), self.sort_keys.next(), meta)
            })
            .collect();

        container.add_children(tracks.iter().cloned().map(CatalogNode::Track).collect());

        debug!(
            container_id = container.id(),
            added = tracks.len(),
            children = container.child_count(),
            "Merged playlist page"
        );
        Ok(tracks)
    }
}
