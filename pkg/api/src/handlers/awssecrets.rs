use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::ApiError;
use crate::AppState;
use pkg_types::awssecret::{AwsSecret, AwsSecretSpec};
use pkg_types::meta::ObjectKey;
use pkg_types::validate::{validate_name, validate_namespace};

fn object_key(ns: String, name: String) -> Result<ObjectKey, ApiError> {
    validate_namespace(&ns).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    validate_name(&name).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(ObjectKey::new(ns, name))
}

/// GET /apis/v1alpha1/awssecrets
pub async fn list_all(State(state): State<AppState>) -> Result<Json<Vec<AwsSecret>>, ApiError> {
    Ok(Json(state.registry.list_awssecrets(None).await?))
}

/// GET /apis/v1alpha1/namespaces/{ns}/awssecrets
pub async fn list_namespaced(
    State(state): State<AppState>,
    Path(ns): Path<String>,
) -> Result<Json<Vec<AwsSecret>>, ApiError> {
    Ok(Json(state.registry.list_awssecrets(Some(&ns)).await?))
}

/// PUT /apis/v1alpha1/namespaces/{ns}/awssecrets/{name}: create or replace
/// the spec.
pub async fn apply(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
    Json(spec): Json<AwsSecretSpec>,
) -> Result<impl IntoResponse, ApiError> {
    let key = object_key(ns, name)?;
    let (decl, created) = state.registry.apply_awssecret(&key, spec).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(decl)))
}

/// GET /apis/v1alpha1/namespaces/{ns}/awssecrets/{name}
pub async fn get(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
) -> Result<Json<AwsSecret>, ApiError> {
    let key = ObjectKey::new(ns, name);
    state
        .registry
        .get_awssecret(&key)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("awssecret {} not found", key)))
}

/// DELETE /apis/v1alpha1/namespaces/{ns}/awssecrets/{name}: also removes
/// the Secrets it owns.
pub async fn delete(
    State(state): State<AppState>,
    Path((ns, name)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let key = ObjectKey::new(ns, name);
    if state.registry.delete_awssecret(&key).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("awssecret {} not found", key)))
    }
}
