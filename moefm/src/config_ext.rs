//! Extension pour intégrer la configuration Moe FM dans moeconfig
//!
//! Ce module fournit le trait `MoeFmConfigExt` qui ajoute à `moeconfig::Config`
//! les paramètres du catalogue et les secrets OAuth.
//!
//! # Exemple
//!
//! ```rust,ignore
//! use moeconfig::get_config;
//! use moefm::MoeFmConfigExt;
//!
//! let config = get_config();
//! let min_tracks = config.get_moefm_min_tracks()?;
//! let per_page = config.get_moefm_tracks_per_request()?;
//! ```

use crate::api::DEFAULT_API_ROOT;
use crate::api::playlist::DEFAULT_TRACKS_PER_REQUEST;
use crate::catalog::DEFAULT_MIN_TRACKS_IN_PLAYLIST;
use crate::catalog::container::EmptyPagePolicy;
use anyhow::Result;
use moeconfig::Config;
use serde_yaml::{Number, Value};
use std::time::Duration;

const DEFAULT_EMPTY_PAGE_RETRIES: usize = 0;
const DEFAULT_EMPTY_PAGE_BACKOFF_MS: usize = 1000;

/// Trait d'extension pour gérer la configuration Moe FM dans moeconfig
pub trait MoeFmConfigExt {
    /// Racine de l'API (default: `https://moe.fm`)
    fn get_moefm_api_root(&self) -> Result<String>;

    /// Couple (consumer_key, consumer_secret) de l'application
    fn get_moefm_consumer(&self) -> Result<(String, String)>;

    /// Tokens OAuth de l'utilisateur, `None` tant que la connexion n'a pas été faite
    fn get_moefm_oauth_tokens(&self) -> Result<Option<(String, String)>>;

    /// Enregistre les tokens OAuth de l'utilisateur
    fn set_moefm_oauth_tokens(&self, token: &str, token_secret: &str) -> Result<()>;

    /// Nombre minimal de morceaux à maintenir dans la playlist (default: 120)
    fn get_moefm_min_tracks(&self) -> Result<usize>;

    fn set_moefm_min_tracks(&self, count: usize) -> Result<()>;

    /// Taille de page demandée à chaque requête (default: 30)
    fn get_moefm_tracks_per_request(&self) -> Result<usize>;

    fn set_moefm_tracks_per_request(&self, count: usize) -> Result<()>;

    /// Politique de relance sur page vide
    fn get_moefm_empty_page_policy(&self) -> Result<EmptyPagePolicy>;

    /// Titre d'un conteneur du catalogue (`name`, `playlist_title`, `favorites_title`)
    fn get_moefm_catalog_title(&self, key: &str, default: &str) -> Result<String>;
}

impl MoeFmConfigExt for Config {
    fn get_moefm_api_root(&self) -> Result<String> {
        Ok(self
            .get_string(&["moefm", "api_root"])?
            .unwrap_or_else(|| DEFAULT_API_ROOT.to_string()))
    }

    fn get_moefm_consumer(&self) -> Result<(String, String)> {
        let key = self.get_string(&["moefm", "consumer_key"])?;
        let secret = self.get_string(&["moefm", "consumer_secret"])?;
        match (key, secret) {
            (Some(key), Some(secret)) => Ok((key, secret)),
            _ => Err(anyhow::anyhow!(
                "moefm.consumer_key and moefm.consumer_secret must be configured"
            )),
        }
    }

    fn get_moefm_oauth_tokens(&self) -> Result<Option<(String, String)>> {
        let token = self.get_string(&["moefm", "oauth_tokens", "oauth_token"])?;
        let secret = self.get_string(&["moefm", "oauth_tokens", "oauth_token_secret"])?;
        Ok(token.zip(secret))
    }

    fn set_moefm_oauth_tokens(&self, token: &str, token_secret: &str) -> Result<()> {
        self.set_value(
            &["moefm", "oauth_tokens", "oauth_token"],
            Value::String(token.to_string()),
        )?;
        self.set_value(
            &["moefm", "oauth_tokens", "oauth_token_secret"],
            Value::String(token_secret.to_string()),
        )
    }

    fn get_moefm_min_tracks(&self) -> Result<usize> {
        self.get_usize(
            &["moefm", "min_tracks_in_playlist"],
            DEFAULT_MIN_TRACKS_IN_PLAYLIST,
        )
    }

    fn set_moefm_min_tracks(&self, count: usize) -> Result<()> {
        self.set_value(
            &["moefm", "min_tracks_in_playlist"],
            Value::Number(Number::from(count)),
        )
    }

    fn get_moefm_tracks_per_request(&self) -> Result<usize> {
        // Une page de zéro morceau ne remplirait jamais rien
        let per_page = self.get_usize(
            &["moefm", "tracks_per_request"],
            DEFAULT_TRACKS_PER_REQUEST,
        )?;
        Ok(per_page.max(1))
    }

    fn set_moefm_tracks_per_request(&self, count: usize) -> Result<()> {
        self.set_value(
            &["moefm", "tracks_per_request"],
            Value::Number(Number::from(count)),
        )
    }

    fn get_moefm_empty_page_policy(&self) -> Result<EmptyPagePolicy> {
        let retries = self.get_usize(
            &["moefm", "empty_page_retries"],
            DEFAULT_EMPTY_PAGE_RETRIES,
        )?;
        let backoff = self.get_usize(
            &["moefm", "empty_page_backoff_ms"],
            DEFAULT_EMPTY_PAGE_BACKOFF_MS,
        )?;
        Ok(EmptyPagePolicy {
            max_retries: retries as u32,
            backoff: Duration::from_millis(backoff as u64),
        })
    }

    fn get_moefm_catalog_title(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .get_string(&["moefm", "catalog", key])?
            .unwrap_or_else(|| default.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        (dir, config)
    }

    #[test]
    fn test_catalog_defaults() {
        let (_dir, config) = temp_config();
        assert_eq!(config.get_moefm_min_tracks().unwrap(), 120);
        assert_eq!(config.get_moefm_tracks_per_request().unwrap(), 30);
        assert_eq!(config.get_moefm_api_root().unwrap(), "https://moe.fm");

        let policy = config.get_moefm_empty_page_policy().unwrap();
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.backoff, Duration::from_millis(1000));
    }

    #[test]
    fn test_tokens_roundtrip_through_config() {
        let (_dir, config) = temp_config();
        assert!(config.get_moefm_oauth_tokens().unwrap().is_none());

        config.set_moefm_oauth_tokens("tok", "sec").unwrap();
        assert_eq!(
            config.get_moefm_oauth_tokens().unwrap(),
            Some(("tok".to_string(), "sec".to_string()))
        );
    }

    #[test]
    fn test_missing_consumer_is_an_error() {
        let (_dir, config) = temp_config();
        assert!(config.get_moefm_consumer().is_err());
    }

    #[test]
    fn test_zero_page_size_is_clamped() {
        let (_dir, config) = temp_config();
        config.set_moefm_tracks_per_request(0).unwrap();
        assert_eq!(config.get_moefm_tracks_per_request().unwrap(), 1);
    }
}
