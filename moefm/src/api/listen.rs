//! Rapport d'écoute (`/ajax/log`)

use super::SignedApi;
use crate::error::{MoeFmError, Result};
use crate::models::{Envelope, LogResponse};
use tracing::debug;

/// Endpoint de journalisation des écoutes
pub const LISTEN_LOG_ENDPOINT: &str =
    "/ajax/log?log_obj_type=sub&log_type=listen&obj_type=song&api=json";

/// Signale à Moe FM qu'un morceau a été écouté
///
/// Toute erreur (transport ou applicative) est remontée sous forme de
/// [`MoeFmError::Telemetry`].
pub async fn report_listen(api: &dyn SignedApi, sub_id: &str) -> Result<()> {
    let params = [("obj_id".to_string(), sub_id.to_string())];
    let raw = api
        .get_json(LISTEN_LOG_ENDPOINT, &params)
        .await
        .map_err(|e| MoeFmError::Telemetry(e.to_string()))?;

    let envelope: Envelope<LogResponse> =
        serde_json::from_value(raw).map_err(|e| MoeFmError::Telemetry(e.to_string()))?;
    if envelope.response.information.has_error {
        return Err(MoeFmError::Telemetry(
            envelope.response.information.error_message(),
        ));
    }

    debug!(sub_id, "Logged listen");
    Ok(())
}
