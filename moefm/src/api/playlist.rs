//! Accès aux pages de playlist (`/listen/playlist`)

use super::SignedApi;
use crate::error::{MoeFmError, Result};
use crate::models::{Envelope, PlaylistEntry, PlaylistResponse};
use tracing::{debug, warn};

/// Endpoint de la playlist d'écoute
pub const PLAYLIST_ENDPOINT: &str = "/listen/playlist?api=json";

/// Taille de page par défaut
pub const DEFAULT_TRACKS_PER_REQUEST: usize = 30;

/// Paramètres d'une requête de page, propres à un conteneur
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistQuery {
    pub endpoint: String,
    pub per_page: usize,
    /// Paramètres fixes supplémentaires (ex: `fav=song`)
    pub extra: Vec<(String, String)>,
}

impl Default for PlaylistQuery {
    fn default() -> Self {
        Self {
            endpoint: PLAYLIST_ENDPOINT.to_string(),
            per_page: DEFAULT_TRACKS_PER_REQUEST,
            extra: Vec::new(),
        }
    }
}

impl PlaylistQuery {
    pub fn with_per_page(per_page: usize) -> Self {
        Self {
            per_page,
            ..Self::default()
        }
    }

    /// Ajoute un paramètre fixe
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }

    /// Paramètres effectivement envoyés
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![("perpage".to_string(), self.per_page.to_string())];
        params.extend(self.extra.iter().cloned());
        params
    }
}

/// Récupère et décode une page de playlist
///
/// Une réponse dont `information.has_error` est positionné est convertie en
/// [`MoeFmError::RemoteApplication`].
pub async fn fetch_playlist_page(
    api: &dyn SignedApi,
    query: &PlaylistQuery,
) -> Result<Vec<PlaylistEntry>> {
    let raw = api.get_json(&query.endpoint, &query.params()).await?;
    let envelope: Envelope<PlaylistResponse> = serde_json::from_value(raw)?;
    let response = envelope.response;

    if response.information.has_error {
        let message = response.information.error_message();
        warn!("Got error response: {}", message);
        return Err(MoeFmError::RemoteApplication(message));
    }

    debug!(
        entries = response.playlist.len(),
        page = ?response.information.page,
        "Got playlist page"
    );
    Ok(response.playlist)
}
