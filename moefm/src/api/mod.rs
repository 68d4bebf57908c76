//! Couche d'accès à l'API REST Moe FM
//!
//! Ce module fournit le trait [`SignedApi`], seule frontière entre le catalogue
//! et le réseau, ainsi que son implémentation HTTP signée OAuth [`MoeFmApi`].

pub mod listen;
pub mod playlist;
pub mod signing;

use crate::error::{MoeFmError, Result};
use reqwest::{Client, Response, Url};
use serde_json::Value;
use signing::OAuthCredentials;
use std::time::Duration;
use tracing::{debug, warn};

/// URL de base de l'API Moe FM
pub const DEFAULT_API_ROOT: &str = "https://moe.fm";

/// Timeout par défaut des requêtes
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client capable d'effectuer des requêtes authentifiées
///
/// La signature et l'authentification sont transparentes pour l'appelant.
/// Les erreurs de transport et d'authentification sont remontées telles
/// quelles ; le contrôle du drapeau `has_error` incombe à l'appelant qui
/// décode la charge utile.
#[async_trait::async_trait]
pub trait SignedApi: Send + Sync {
    /// Effectue un GET sur `endpoint` (relatif à la racine de l'API)
    async fn get_json(&self, endpoint: &str, params: &[(String, String)]) -> Result<Value>;
}

/// Client HTTP signé OAuth 1.0a
pub struct MoeFmApi {
    /// Client HTTP
    client: Client,
    /// Racine de l'API, sans `/` final
    api_root: String,
    consumer_key: String,
    consumer_secret: String,
    /// Tokens utilisateur (`oauth_token`, `oauth_token_secret`)
    tokens: Option<(String, String)>,
}

impl std::fmt::Debug for MoeFmApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MoeFmApi")
            .field("api_root", &self.api_root)
            .field("authenticated", &self.tokens.is_some())
            .finish()
    }
}

impl MoeFmApi {
    /// Crée une nouvelle instance de l'API
    pub fn new(
        api_root: impl Into<String>,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("moefm/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_root: api_root.into().trim_end_matches('/').to_string(),
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            tokens: None,
        })
    }

    /// Crée le client depuis la configuration globale
    pub fn from_config() -> Result<Self> {
        let config = moeconfig::get_config();
        Self::from_config_obj(config.as_ref())
    }

    /// Crée le client depuis un objet Config spécifique
    pub fn from_config_obj(config: &moeconfig::Config) -> Result<Self> {
        use crate::config_ext::MoeFmConfigExt;

        let (consumer_key, consumer_secret) = config.get_moefm_consumer()?;
        let mut api = Self::new(config.get_moefm_api_root()?, consumer_key, consumer_secret)?;
        if let Some((token, secret)) = config.get_moefm_oauth_tokens()? {
            api.set_tokens(token, secret);
        }
        Ok(api)
    }

    /// Définit les tokens OAuth de l'utilisateur
    pub fn set_tokens(&mut self, token: String, token_secret: String) {
        self.tokens = Some((token, token_secret));
    }

    /// Retourne la racine de l'API
    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// Indique si des tokens sont disponibles
    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_some()
    }

    fn credentials(&self) -> Result<OAuthCredentials> {
        let (token, token_secret) = self
            .tokens
            .clone()
            .ok_or_else(|| MoeFmError::Unauthorized("OAuth token is unavailable".into()))?;

        Ok(OAuthCredentials {
            consumer_key: self.consumer_key.clone(),
            consumer_secret: self.consumer_secret.clone(),
            token,
            token_secret,
        })
    }

    /// Traite la réponse HTTP
    async fn handle_response(&self, response: Response) -> Result<Value> {
        let status = response.status();
        debug!("Response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("API error ({}): {}", status.as_u16(), error_text);
            return Err(MoeFmError::from_status_code(status.as_u16(), error_text));
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            warn!("Failed to parse response: {}", e);
            MoeFmError::JsonParse(e)
        })
    }
}

#[async_trait::async_trait]
impl SignedApi for MoeFmApi {
    async fn get_json(&self, endpoint: &str, params: &[(String, String)]) -> Result<Value> {
        let credentials = self.credentials()?;
        let url = Url::parse(&format!("{}{}", self.api_root, endpoint))
            .map_err(|e| MoeFmError::Configuration(anyhow::anyhow!("invalid URL: {}", e)))?;

        debug!("GET {} with {} params", url, params.len());

        let header = signing::authorization_header(
            &credentials,
            "GET",
            &url,
            params,
            &signing::get_nonce(),
            &signing::get_timestamp(),
        )?;

        let response = self
            .client
            .get(url)
            .query(params)
            .header(reqwest::header::AUTHORIZATION, header)
            .send()
            .await?;

        self.handle_response(response).await
    }
}
