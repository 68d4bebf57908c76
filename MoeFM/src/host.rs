use moefm::{ContainerUpdate, DirectoryHost, NotificationError};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::info;

/// Variables d'état ContentDirectory publiées aux clients
#[derive(Debug, Default)]
pub struct ContentDirectoryState {
    system_update_id: AtomicU32,
    container_update_ids: Mutex<String>,
}

impl ContentDirectoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn system_update_id(&self) -> u32 {
        self.system_update_id.load(Ordering::SeqCst)
    }

    /// Dernière valeur `ContainerUpdateIDs` (`<id>,<update_id>`)
    pub fn container_update_ids(&self) -> String {
        self.container_update_ids
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl DirectoryHost for ContentDirectoryState {
    fn container_updated(&self, update: &ContainerUpdate) -> Result<(), NotificationError> {
        // Ordonnées par conteneur, pas entre conteneurs différents
        self.system_update_id
            .fetch_max(update.system_update_id, Ordering::SeqCst);
        info!("ContentDirectory: SystemUpdateID -> {}", update.system_update_id);

        let value = format!("{},{}", update.container_id, update.container_update_id);
        info!("ContentDirectory: ContainerUpdateIDs -> {}", value);

        let mut guard = self
            .container_update_ids
            .lock()
            .map_err(|_| NotificationError("ContainerUpdateIDs lock poisoned".into()))?;
        *guard = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(system_update_id: u32, container_id: &str, container_update_id: u32) -> ContainerUpdate {
        ContainerUpdate {
            system_update_id,
            container_id: container_id.into(),
            container_update_id,
        }
    }

    #[test]
    fn test_container_update_ids_follow_mutations() {
        let state = ContentDirectoryState::new();

        state.container_updated(&update(1, "1", 1)).unwrap();
        assert_eq!(state.container_update_ids(), "1,1");
        state.container_updated(&update(2, "1", 2)).unwrap();
        assert_eq!(state.container_update_ids(), "1,2");

        assert_eq!(state.system_update_id(), 2);
    }

    #[test]
    fn test_system_update_id_never_goes_back_across_containers() {
        let state = ContentDirectoryState::new();

        // Containers "1" and "2" mutated concurrently
        state.container_updated(&update(4, "2", 1)).unwrap();
        state.container_updated(&update(3, "1", 3)).unwrap();

        assert_eq!(state.system_update_id(), 4);
        assert_eq!(state.container_update_ids(), "1,3");
    }
}
