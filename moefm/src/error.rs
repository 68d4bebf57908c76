//! Gestion des erreurs pour le client et le catalogue Moe FM

use thiserror::Error;

/// Type Result personnalisé pour moefm
pub type Result<T> = std::result::Result<T, MoeFmError>;

/// Erreurs possibles lors de l'utilisation du client ou du catalogue
#[derive(Error, Debug)]
pub enum MoeFmError {
    /// Erreur de transport HTTP
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Statut HTTP non 2xx
    #[error("Moe FM returned HTTP {code}: {message}")]
    Status { code: u16, message: String },

    /// Tokens OAuth absents ou refusés
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Réponse décodée avec `has_error` positionné
    #[error("Moe FM API error: {0}")]
    RemoteApplication(String),

    /// Erreur de parsing JSON
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Entrée de playlist inexploitable
    #[error("Invalid playlist entry: {0}")]
    InvalidEntry(String),

    /// Échec du rapport d'écoute
    #[error("Failed to report play: {0}")]
    Telemetry(String),

    /// Erreur de configuration (anyhow)
    #[error("Configuration error: {0}")]
    Configuration(#[from] anyhow::Error),

    /// Objet inconnu du catalogue
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object is not a container: {0}")]
    NotAContainer(String),

    #[error("Object is not a track: {0}")]
    NotATrack(String),
}

impl MoeFmError {
    /// Crée une erreur depuis un code de statut HTTP et un message
    pub fn from_status_code(code: u16, message: impl Into<String>) -> Self {
        match code {
            401 | 403 => Self::Unauthorized(message.into()),
            _ => Self::Status {
                code,
                message: message.into(),
            },
        }
    }

    /// Erreur survenue avant d'obtenir une réponse exploitable
    /// (réseau, statut HTTP, authentification)
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            MoeFmError::Http(_) | MoeFmError::Status { .. } | MoeFmError::Unauthorized(_)
        )
    }

    /// Vérifie si l'erreur est une erreur d'authentification
    pub fn is_auth_error(&self) -> bool {
        matches!(self, MoeFmError::Unauthorized(_))
    }
}
