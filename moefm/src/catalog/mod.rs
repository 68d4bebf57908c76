//! Catalogue paresseux et auto-réapprovisionné
//!
//! Le catalogue est un arbre de conteneurs et de morceaux chargé à la demande
//! depuis l'API Moe FM :
//!
//! - [`Container`] : conteneur racine, standard (chargé une seule fois) ou
//!   réapprovisionné (maintenu au-dessus d'un nombre minimal de morceaux)
//! - [`Track`] : morceau immuable construit depuis une entrée de playlist
//! - [`PaginatedLoader`] : récupère une page et la fusionne en un seul lot
//! - [`VersionPropagator`] : compteurs `update_id` / `SystemUpdateID`
//! - [`PlaybackSessions`] : couplage lecture → rapport d'écoute → éviction
//! - [`Catalog`] : assemble le tout et expose les opérations de l'hôte
//!
//! # Exemple
//!
//! ```rust,ignore
//! use moefm::{Catalog, MoeFmApi};
//! use std::sync::Arc;
//!
//! let api = Arc::new(MoeFmApi::from_config()?);
//! let catalog = Catalog::from_config(api)?;
//! catalog.initialize(host);
//!
//! for node in catalog.get_children("1").await? {
//!     println!("{} - {}", node.id(), node.name());
//! }
//! ```

pub mod container;
pub mod loader;
pub mod node;
pub mod playback;
pub mod sort_key;
pub mod store;
pub mod track;
pub mod version;

pub use container::{Container, ContainerKind, EmptyPagePolicy, LoadState};
pub use loader::PaginatedLoader;
pub use node::{CatalogNode, NodeIndex};
pub use playback::{CommitOutcome, PlaybackHandle, PlaybackSessions};
pub use sort_key::SortKeyAllocator;
pub use store::{Catalog, CatalogBuilder, parse_base_id};
pub use track::{Track, TrackMetadata};
pub use version::{ContainerUpdate, DirectoryHost, NotificationError, VersionPropagator};

/// Identifiant bien connu du conteneur racine
pub const ROOT_ID: &str = "0";

/// Nombre minimal de morceaux maintenus dans la playlist par défaut
pub const DEFAULT_MIN_TRACKS_IN_PLAYLIST: usize = 120;
