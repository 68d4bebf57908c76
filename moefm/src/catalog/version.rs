//! Compteurs de version et notification de l'hôte
//!
//! Chaque mutation structurelle d'un conteneur (fusion d'une page, retrait
//! d'un morceau) incrémente l'`update_id` du conteneur puis le
//! `SystemUpdateID` global, et pousse le triplet résultant vers l'hôte
//! ContentDirectory. La notification est best-effort : un échec est journalisé
//! et la mutation reste acquise.

use super::container::Container;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Échec de la notification de l'hôte
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to notify directory host: {0}")]
pub struct NotificationError(pub String);

/// Changement publié après une mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerUpdate {
    pub system_update_id: u32,
    pub container_id: String,
    pub container_update_id: u32,
}

/// Hôte de navigation qui reçoit les changements de version
///
/// L'appel est synchrone : un hôte qui doit faire un travail asynchrone
/// (mise à jour d'une variable d'état GENA par exemple) le lance lui-même.
pub trait DirectoryHost: Send + Sync {
    fn container_updated(&self, update: &ContainerUpdate) -> Result<(), NotificationError>;
}

/// Propriétaire du `SystemUpdateID`
#[derive(Default)]
pub struct VersionPropagator {
    system_update_id: AtomicU32,
    host: RwLock<Option<Arc<dyn DirectoryHost>>>,
}

impl std::fmt::Debug for VersionPropagator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionPropagator")
            .field("system_update_id", &self.system_update_id())
            .field("host_attached", &self.has_host())
            .finish()
    }
}

impl VersionPropagator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Branche l'hôte qui recevra les notifications
    pub fn attach(&self, host: Arc<dyn DirectoryHost>) {
        match self.host.write() {
            Ok(mut guard) => *guard = Some(host),
            Err(poisoned) => *poisoned.into_inner() = Some(host),
        }
        info!("Directory host attached");
    }

    pub fn has_host(&self) -> bool {
        self.current_host().is_some()
    }

    pub fn system_update_id(&self) -> u32 {
        self.system_update_id.load(Ordering::SeqCst)
    }

    /// Enregistre une mutation structurelle de `container`
    ///
    /// Doit être appelé exactement une fois par lot (page fusionnée, retrait).
    pub fn on_mutation(&self, container: &Container) -> ContainerUpdate {
        let container_update_id = container.bump_update_id();
        let system_update_id = self
            .system_update_id
            .fetch_add(1, Ordering::SeqCst)
            .wrapping_add(1);

        let update = ContainerUpdate {
            system_update_id,
            container_id: container.id().to_string(),
            container_update_id,
        };

        match self.current_host() {
            None => debug!(
                container_id = %update.container_id,
                container_update_id,
                system_update_id,
                "No directory host attached, skipping notification"
            ),
            Some(host) => match host.container_updated(&update) {
                Ok(()) => debug!(
                    container_id = %update.container_id,
                    container_update_id,
                    system_update_id,
                    "Container update notified"
                ),
                Err(err) => warn!(
                    container_id = %update.container_id,
                    error = %err,
                    "Failed to notify container update"
                ),
            },
        }

        update
    }

    fn current_host(&self) -> Option<Arc<dyn DirectoryHost>> {
        match self.host.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
