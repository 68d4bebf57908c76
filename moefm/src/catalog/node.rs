use super::container::Container;
use super::track::{Track, TrackMetadata, base_track_id, disambiguated_track_id};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Noeud de l'arbre : conteneur ou morceau
#[derive(Debug, Clone)]
pub enum CatalogNode {
    Container(Arc<Container>),
    Track(Arc<Track>),
}

impl CatalogNode {
    pub fn id(&self) -> &str {
        match self {
            CatalogNode::Container(c) => c.id(),
            CatalogNode::Track(t) => t.id(),
        }
    }

    /// `None` pour la racine uniquement
    pub fn parent_id(&self) -> Option<&str> {
        match self {
            CatalogNode::Container(c) => c.parent_id(),
            CatalogNode::Track(t) => Some(t.parent_id()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CatalogNode::Container(c) => c.name(),
            CatalogNode::Track(t) => t.name(),
        }
    }

    pub fn sort_key(&self) -> u64 {
        match self {
            CatalogNode::Container(c) => c.sort_key(),
            CatalogNode::Track(t) => t.sort_key(),
        }
    }

    pub fn as_container(&self) -> Option<&Arc<Container>> {
        match self {
            CatalogNode::Container(c) => Some(c),
            CatalogNode::Track(_) => None,
        }
    }

    pub fn as_track(&self) -> Option<&Arc<Track>> {
        match self {
            CatalogNode::Track(t) => Some(t),
            CatalogNode::Container(_) => None,
        }
    }
}

impl From<Arc<Container>> for CatalogNode {
    fn from(container: Arc<Container>) -> Self {
        CatalogNode::Container(container)
    }
}

impl From<Arc<Track>> for CatalogNode {
    fn from(track: Arc<Track>) -> Self {
        CatalogNode::Track(track)
    }
}

/// Index de tous les noeuds jamais créés
///
/// Un morceau retiré de son conteneur reste résolvable par son identifiant,
/// et un identifiant enregistré n'est jamais réattribué.
#[derive(Debug, Default)]
pub struct NodeIndex {
    nodes: Mutex<HashMap<String, CatalogNode>>,
}

impl NodeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<CatalogNode> {
        self.lock().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Enregistre un conteneur
    pub fn insert_container(&self, container: Arc<Container>) {
        self.lock()
            .insert(container.id().to_string(), CatalogNode::Container(container));
    }

    /// Crée et enregistre un morceau sous un identifiant neuf
    ///
    /// L'identifiant est `track-<sub_id>$<container>`, ou
    /// `track-<sub_id>-<sort_key>$<container>` si le premier a déjà servi.
    pub fn insert_track(
        &self,
        container_id: &str,
        sort_key: u64,
        metadata: TrackMetadata,
    ) -> Arc<Track> {
        let mut nodes = self.lock();

        let mut id = base_track_id(&metadata.sub_id, container_id);
        if nodes.contains_key(&id) {
            id = disambiguated_track_id(&metadata.sub_id, sort_key, container_id);
        }

        let track = Arc::new(Track::new(id.clone(), container_id, sort_key, metadata));
        nodes.insert(id, CatalogNode::Track(track.clone()));
        track
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CatalogNode>> {
        self.nodes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(sub_id: &str) -> TrackMetadata {
        TrackMetadata {
            sub_id: sub_id.into(),
            title: format!("Song {}", sub_id),
            original_track_number: None,
            artist: String::new(),
            album: String::new(),
            cover_url: None,
            duration: "0:03:00".into(),
            duration_seconds: 180,
            stream_locator: format!("http://stream/{}.mp3", sub_id),
            file_size_bytes: 0,
        }
    }

    #[test]
    fn test_refetched_song_gets_a_fresh_id() {
        let index = NodeIndex::new();
        let first = index.insert_track("1", 1, metadata("42"));
        let second = index.insert_track("1", 7, metadata("42"));

        assert_eq!(first.id(), "track-42$1");
        assert_eq!(second.id(), "track-42-7$1");
        assert_eq!(index.len(), 2);

        // Le premier reste résolvable
        let node = index.get("track-42$1").unwrap();
        assert_eq!(node.sort_key(), 1);
        assert!(node.as_track().is_some());
    }

    #[test]
    fn test_same_song_in_two_containers() {
        let index = NodeIndex::new();
        let a = index.insert_track("1", 1, metadata("42"));
        let b = index.insert_track("2", 2, metadata("42"));
        assert_eq!(a.id(), "track-42$1");
        assert_eq!(b.id(), "track-42$2");
        assert_eq!(b.parent_id(), "2");
    }
}
