use axum::{
    Json,
    extract::{Path, State},
};

use super::ApiError;
use crate::AppState;
use pkg_types::meta::ObjectKey;
use pkg_types::secret::Secret;

/// GET /api/v1/namespaces/{ns}/secrets
pub async fn list_secrets(
    State(state): State<AppState>,
    Path(ns): Path<String>,
) -> Result<Json<Vec<Secret>>, ApiError> {
    Ok(Json(state.registry.list_secrets(&ns).await?))
}

/// GET /api/v1/namespaces/{ns}/secrets/{name}
pub async fn get_secret(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
) -> Result<Json<Secret>, ApiError> {
    let key = ObjectKey::new(ns, name);
    state
        .registry
        .get_secret(&key)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("secret {} not found", key)))
}
