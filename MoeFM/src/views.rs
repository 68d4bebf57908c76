//! Représentation JSON des nœuds du catalogue

use moefm::{CatalogNode, Container, Track};
use serde::Serialize;

/// Vue sérialisable d'un nœud (conteneur ou morceau)
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeView {
    Container {
        id: String,
        parent_id: Option<String>,
        title: String,
        child_count: usize,
        update_id: u32,
    },
    Track {
        id: String,
        parent_id: String,
        title: String,
        artist: String,
        album: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        original_track_number: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        album_art_uri: Option<String>,
        duration: String,
        size: u64,
        protocol_info: String,
        /// URL servie par `/stream/{id}`
        url: String,
    },
}

impl NodeView {
    pub fn from_node(node: &CatalogNode, base_url: &str) -> Self {
        match node {
            CatalogNode::Container(container) => Self::from_container(container),
            CatalogNode::Track(track) => Self::from_track(track, base_url),
        }
    }

    pub fn from_container(container: &Container) -> Self {
        NodeView::Container {
            id: container.id().to_string(),
            parent_id: container.parent_id().map(str::to_string),
            title: container.name().to_string(),
            child_count: container.child_count(),
            update_id: container.update_id(),
        }
    }

    pub fn from_track(track: &Track, base_url: &str) -> Self {
        let metadata = track.metadata();
        NodeView::Track {
            id: track.id().to_string(),
            parent_id: track.parent_id().to_string(),
            title: track.name().to_string(),
            artist: metadata.artist.clone(),
            album: metadata.album.clone(),
            original_track_number: metadata.original_track_number,
            album_art_uri: metadata.cover_url.clone(),
            duration: track.duration().to_string(),
            size: metadata.file_size_bytes,
            protocol_info: track.protocol_info(),
            url: format!("{}/stream/{}", base_url, track.id()),
        }
    }
}
