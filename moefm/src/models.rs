//! Structures de données pour les réponses de l'API Moe FM

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Désérialiseur flexible pour les champs qui peuvent être des strings ou des integers
pub(crate) fn deserialize_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        _ => Err(Error::custom("expected a string or a number")),
    }
}

/// Désérialiseur flexible pour les entiers transmis sous forme de string
pub(crate) fn deserialize_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .ok_or_else(|| Error::custom(format!("invalid unsigned integer {}", n))),
        Value::String(s) if s.trim().is_empty() => Ok(0),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| Error::custom(format!("invalid unsigned integer {:?}", s))),
        Value::Null => Ok(0),
        _ => Err(Error::custom("expected an unsigned integer")),
    }
}

/// Enveloppe `{"response": {...}}` renvoyée par tous les endpoints `api=json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub response: T,
}

/// Bloc `information` commun aux réponses
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Information {
    #[serde(default)]
    pub has_error: bool,
    /// Messages d'erreur éventuels
    #[serde(default)]
    pub msg: Vec<Value>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub perpage: Option<u32>,
    #[serde(default)]
    pub may_have_next: Option<bool>,
}

impl Information {
    /// Concatène les messages d'erreur pour les logs
    pub fn error_message(&self) -> String {
        if self.msg.is_empty() {
            return "unknown error".to_string();
        }
        self.msg
            .iter()
            .map(|m| match m {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Réponse de `/listen/playlist`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistResponse {
    #[serde(default)]
    pub information: Information,
    #[serde(default)]
    pub playlist: Vec<PlaylistEntry>,
}

/// Réponse de `/ajax/log`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogResponse {
    #[serde(default)]
    pub information: Information,
}

/// Jeu de pochettes d'un morceau
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cover {
    #[serde(default)]
    pub small: Option<String>,
    #[serde(default)]
    pub medium: Option<String>,
    #[serde(default)]
    pub square: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
}

/// Morceau tel que renvoyé dans une page de playlist
///
/// Les champs textuels arrivent échappés en HTML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistEntry {
    /// Identifiant distant du morceau (utilisé pour le rapport d'écoute)
    #[serde(deserialize_with = "deserialize_string")]
    pub sub_id: String,
    /// Titre brut, de la forme `song.01 ...`
    #[serde(default, deserialize_with = "deserialize_string")]
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_string")]
    pub sub_title: String,
    #[serde(default, deserialize_with = "deserialize_string")]
    pub artist: String,
    /// Titre de l'album
    #[serde(default, deserialize_with = "deserialize_string")]
    pub wiki_title: String,
    #[serde(default)]
    pub cover: Cover,
    /// Durée affichable (`MM:SS` ou `HH:MM:SS`)
    #[serde(default, deserialize_with = "deserialize_string")]
    pub stream_time: String,
    /// Durée en secondes
    #[serde(default, deserialize_with = "deserialize_u64")]
    pub stream_length: u64,
    /// URL du flux MP3
    pub url: String,
    /// Taille en KiB
    #[serde(default, deserialize_with = "deserialize_u64")]
    pub file_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_accepts_numeric_and_string_fields() {
        let entry: PlaylistEntry = serde_json::from_value(json!({
            "sub_id": 42,
            "title": "song.03 Foo",
            "sub_title": "Foo",
            "artist": "Bar",
            "wiki_title": "Baz",
            "cover": {"large": "http://img/large.jpg"},
            "stream_time": "03:45",
            "stream_length": "225",
            "url": "http://nyan.moe.fm/42.mp3",
            "file_size": 3500
        }))
        .unwrap();

        assert_eq!(entry.sub_id, "42");
        assert_eq!(entry.stream_length, 225);
        assert_eq!(entry.file_size, 3500);
        assert_eq!(entry.cover.large.as_deref(), Some("http://img/large.jpg"));
    }

    #[test]
    fn test_error_message_joins_messages() {
        let info: Information = serde_json::from_value(json!({
            "has_error": true,
            "msg": ["oauth failed", 7]
        }))
        .unwrap();
        assert!(info.has_error);
        assert_eq!(info.error_message(), "oauth failed; 7");
    }
}
