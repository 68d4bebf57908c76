//! # moefm - Catalogue Moe FM pour un MediaServer UPnP
//!
//! Cette crate expose la playlist d'écoute de [Moe FM](https://moe.fm) sous la
//! forme d'un arbre ContentDirectory navigable qui se réapprovisionne tout seul.
//!
//! ## Vue d'ensemble
//!
//! - Client HTTP signé OAuth 1.0a (HMAC-SHA1) pour l'API Moe FM
//! - Chargement paresseux et paginé des playlists
//! - Playlist d'écoute maintenue au-dessus d'un nombre minimal de morceaux
//! - Compteurs `update_id` / `SystemUpdateID` propagés à l'hôte
//! - Sessions de lecture : rapport d'écoute et éviction à mi-morceau
//!
//! ## Architecture
//!
//! - `api` : trait [`SignedApi`] et son implémentation HTTP [`MoeFmApi`]
//! - `models` : structures des réponses JSON
//! - `catalog` : arbre, chargement, versions, sessions de lecture
//! - `config_ext` : paramètres Moe FM dans `moeconfig`
//! - `error` : gestion des erreurs
//!
//! ## Structure des modules
//!
//! ```text
//! moefm/
//! ├── src/
//! │   ├── lib.rs              # Module principal (ce fichier)
//! │   ├── api/
//! │   │   ├── mod.rs          # Trait SignedApi et client HTTP
//! │   │   ├── signing.rs      # Signature OAuth 1.0a
//! │   │   ├── playlist.rs     # Pages de playlist
//! │   │   └── listen.rs       # Rapport d'écoute
//! │   ├── catalog/
//! │   │   ├── mod.rs
//! │   │   ├── node.rs         # CatalogNode et index des noeuds
//! │   │   ├── sort_key.rs     # Allocateur de clés de tri
//! │   │   ├── track.rs        # Morceaux
//! │   │   ├── container.rs    # Conteneurs et machine à états
//! │   │   ├── loader.rs       # Chargement paginé
//! │   │   ├── version.rs      # Compteurs de version
//! │   │   ├── playback.rs     # Sessions de lecture
//! │   │   └── store.rs        # Catalogue exposé à l'hôte
//! │   ├── config_ext.rs       # Extension moeconfig
//! │   ├── models.rs           # Structures de données
//! │   └── error.rs            # Gestion des erreurs
//! ```
//!
//! ## Utilisation
//!
//! ```rust,no_run
//! use moefm::{Catalog, ContainerUpdate, DirectoryHost, MoeFmApi, NotificationError};
//! use std::sync::Arc;
//!
//! struct LoggingHost;
//!
//! impl DirectoryHost for LoggingHost {
//!     fn container_updated(&self, update: &ContainerUpdate) -> Result<(), NotificationError> {
//!         println!("{:?}", update);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let api = Arc::new(MoeFmApi::from_config()?);
//!     let catalog = Catalog::from_config(api)?;
//!     catalog.initialize(Arc::new(LoggingHost));
//!
//!     for node in catalog.get_children("1").await? {
//!         println!("{} - {}", node.id(), node.name());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Les paramètres sont lus dans `moeconfig` (section `moefm`) :
//!
//! ```yaml
//! moefm:
//!   api_root: https://moe.fm
//!   consumer_key: "..."
//!   consumer_secret: "..."
//!   oauth_tokens:
//!     oauth_token: "..."
//!     oauth_token_secret: "..."
//!   min_tracks_in_playlist: 120
//!   tracks_per_request: 30
//!   empty_page_retries: 0
//!   empty_page_backoff_ms: 1000
//! ```

pub mod api;
pub mod catalog;
pub mod config_ext;
pub mod error;
pub mod models;

pub use api::{MoeFmApi, SignedApi};
pub use catalog::{
    Catalog, CatalogBuilder, CatalogNode, CommitOutcome, Container, ContainerKind,
    ContainerUpdate, DirectoryHost, EmptyPagePolicy, LoadState, NotificationError,
    PlaybackHandle, Track, parse_base_id,
};
pub use config_ext::MoeFmConfigExt;
pub use error::{MoeFmError, Result};
pub use models::PlaylistEntry;
