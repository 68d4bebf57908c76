//! Morceaux du catalogue

use crate::error::{MoeFmError, Result};
use crate::models::PlaylistEntry;
use lazy_static::lazy_static;
use regex::Regex;

/// Type MIME de tous les flux Moe FM
pub const TRACK_MIME_TYPE: &str = "audio/mpeg";

/// Métadonnées d'un morceau, décodées depuis une entrée de playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    /// Identifiant distant, clé du rapport d'écoute
    pub sub_id: String,
    pub title: String,
    pub original_track_number: Option<u32>,
    pub artist: String,
    pub album: String,
    pub cover_url: Option<String>,
    /// Durée toujours qualifiée par les heures (`H:MM:SS[.fff]`)
    pub duration: String,
    pub duration_seconds: u64,
    /// URL distante du flux
    pub stream_locator: String,
    pub file_size_bytes: u64,
}

impl TryFrom<&PlaylistEntry> for TrackMetadata {
    type Error = MoeFmError;

    fn try_from(entry: &PlaylistEntry) -> Result<Self> {
        let sub_id = entry.sub_id.trim();
        if sub_id.is_empty() {
            return Err(MoeFmError::InvalidEntry("missing sub_id".into()));
        }
        if entry.url.trim().is_empty() {
            return Err(MoeFmError::InvalidEntry(format!(
                "missing stream url for sub {}",
                sub_id
            )));
        }

        let cover_url = entry
            .cover
            .large
            .clone()
            .filter(|url| !url.is_empty());

        Ok(Self {
            sub_id: sub_id.to_string(),
            title: unescape(&entry.sub_title),
            original_track_number: parse_track_number(&unescape(&entry.title)),
            artist: unescape(&entry.artist),
            album: unescape(&entry.wiki_title),
            cover_url,
            duration: normalize_duration(&entry.stream_time),
            duration_seconds: entry.stream_length,
            stream_locator: entry.url.clone(),
            file_size_bytes: entry.file_size.saturating_mul(1024),
        })
    }
}

/// Morceau immuable, feuille de l'arbre
///
/// Un morceau retiré de son conteneur reste valide : l'appelant peut
/// continuer à le rendre tant qu'il en garde une référence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    id: String,
    parent_id: String,
    sort_key: u64,
    metadata: TrackMetadata,
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        parent_id: impl Into<String>,
        sort_key: u64,
        metadata: TrackMetadata,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
            sort_key,
            metadata,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Conteneur propriétaire
    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn sort_key(&self) -> u64 {
        self.sort_key
    }

    pub fn name(&self) -> &str {
        &self.metadata.title
    }

    pub fn metadata(&self) -> &TrackMetadata {
        &self.metadata
    }

    pub fn sub_id(&self) -> &str {
        &self.metadata.sub_id
    }

    pub fn duration(&self) -> &str {
        &self.metadata.duration
    }

    pub fn duration_seconds(&self) -> u64 {
        self.metadata.duration_seconds
    }

    pub fn stream_locator(&self) -> &str {
        &self.metadata.stream_locator
    }

    pub fn mime_type(&self) -> &'static str {
        TRACK_MIME_TYPE
    }

    /// Champ `protocolInfo` d'une ressource UPnP
    pub fn protocol_info(&self) -> String {
        format!("http-get:*:{}:*", TRACK_MIME_TYPE)
    }
}

/// Identifiant de base d'un morceau dans un conteneur
pub fn base_track_id(sub_id: &str, container_id: &str) -> String {
    format!("track-{}${}", sub_id, container_id)
}

/// Identifiant d'un morceau déjà vu, désambiguïsé par sa clé de tri
pub fn disambiguated_track_id(sub_id: &str, sort_key: u64, container_id: &str) -> String {
    format!("track-{}-{}${}", sub_id, sort_key, container_id)
}

/// Qualifie une durée par les heures
///
/// ```
/// use moefm::catalog::track::normalize_duration;
///
/// assert_eq!(normalize_duration("3:45"), "0:3:45");
/// assert_eq!(normalize_duration("01:02:03.500"), "01:02:03.500");
/// assert_eq!(normalize_duration("42"), "0:0:42");
/// ```
pub fn normalize_duration(raw: &str) -> String {
    let raw = raw.trim();
    match raw.matches(':').count() {
        0 if raw.is_empty() => "0:00:00".to_string(),
        0 => format!("0:0:{}", raw),
        1 => format!("0:{}", raw),
        _ => raw.to_string(),
    }
}

lazy_static! {
    static ref TRACK_NUMBER_RE: Option<Regex> = Regex::new(r"(?i)^song\.(\d+)\s+.*$").ok();
}

/// Extrait le numéro de piste d'un titre brut `song.<n> ...`
pub fn parse_track_number(raw_title: &str) -> Option<u32> {
    TRACK_NUMBER_RE
        .as_ref()?
        .captures(raw_title)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Décode les entités HTML, en gardant le texte brut s'il est mal formé
fn unescape(raw: &str) -> String {
    htmlescape::decode_html(raw).unwrap_or_else(|_| raw.to_string())
}
