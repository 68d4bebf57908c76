//! Endpoints API REST du serveur Moe FM
//!
//! Navigation dans le catalogue, consultation des identifiants de mise à jour
//! et proxy des flux audio. Chaque GET sur `/stream/{id}` ouvre une
//! session de lecture : le rapport d'écoute et l'éviction sont planifiés par
//! le catalogue.

use crate::host::ContentDirectoryState;
use crate::views::NodeView;
use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use futures::StreamExt;
use moefm::{Catalog, MoeFmError};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// État partagé par les handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub host: Arc<ContentDirectoryState>,
    /// URL publique du serveur, sans `/` final
    pub base_url: String,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(catalog: Catalog, host: Arc<ContentDirectoryState>, base_url: impl Into<String>) -> Self {
        Self {
            catalog,
            host,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }
}

// ============ Gestion des erreurs ============

struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn bad_gateway(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl From<MoeFmError> for AppError {
    fn from(err: MoeFmError) -> Self {
        let status = match &err {
            MoeFmError::NotFound(_) | MoeFmError::NotATrack(_) => StatusCode::NOT_FOUND,
            MoeFmError::NotAContainer(_) => StatusCode::BAD_REQUEST,
            MoeFmError::RemoteApplication(_)
            | MoeFmError::JsonParse(_)
            | MoeFmError::InvalidEntry(_) => StatusCode::BAD_GATEWAY,
            e if e.is_transport() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self {
            status,
            message: err.to_string(),
        }
    }
}

/// Crée le router du serveur
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/browse/{id}", get(browse))
        .route("/api/items/{id}", get(get_item))
        .route("/api/update_ids", get(update_ids))
        .route("/stream/{id}", get(proxy_stream))
        .with_state(state)
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /api/browse/{id}
/// Returns the container and its children, loading them on first access
async fn browse(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let children = state.catalog.get_children(&id).await?;
    let container = state.catalog.get_container(&id)?;

    let children: Vec<NodeView> = children
        .iter()
        .map(|node| NodeView::from_node(node, &state.base_url))
        .collect();

    Ok(Json(json!({
        "container": NodeView::from_container(&container),
        "children": children,
    })))
}

/// GET /api/items/{id}
async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<NodeView>, AppError> {
    let node = state.catalog.get_item(&id)?;
    Ok(Json(NodeView::from_node(&node, &state.base_url)))
}

/// GET /api/update_ids
/// Returns SystemUpdateID and the last ContainerUpdateIDs value
async fn update_ids(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "system_update_id": state.host.system_update_id(),
        "container_update_ids": state.host.container_update_ids(),
    }))
}

/// GET|HEAD /stream/{id}
/// Proxies the MP3 stream (passthrough, Range forwarded)
///
/// Only GET opens a playback session; HEAD just mirrors the upstream headers.
async fn proxy_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let (track, locator) = if method == Method::HEAD {
        let track = state
            .catalog
            .get_item(&id)?
            .as_track()
            .cloned()
            .ok_or_else(|| MoeFmError::NotATrack(id.clone()))?;
        let locator = track.stream_locator().to_string();
        (track, locator)
    } else {
        let handle = state.catalog.start_playback(&id)?;
        info!(
            track_id = handle.track.id(),
            session_id = handle.session_id,
            "Streaming track"
        );
        (handle.track, handle.locator)
    };

    let mut request = state.http.request(method, &locator);
    if let Some(range) = headers.get(header::RANGE) {
        request = request.header(header::RANGE, range.clone());
    }

    let upstream = request.send().await.map_err(|e| {
        warn!(track_id = track.id(), error = %e, "Upstream stream unreachable");
        AppError::bad_gateway(e.to_string())
    })?;

    let status = upstream.status();
    if !status.is_success() {
        return Err(AppError::bad_gateway(format!("Upstream returned {}", status)));
    }
    debug!(track_id = track.id(), %status, "Upstream stream opened");

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static(track.mime_type()),
    );
    for name in [header::CONTENT_LENGTH, header::CONTENT_RANGE, header::ACCEPT_RANGES] {
        if let Some(value) = upstream.headers().get(&name) {
            response_headers.insert(name, value.clone());
        }
    }

    let stream = upstream
        .bytes_stream()
        .map(|chunk| chunk.map_err(std::io::Error::other));

    Ok((status, response_headers, Body::from_stream(stream)).into_response())
}
