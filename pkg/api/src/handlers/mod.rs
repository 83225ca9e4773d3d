pub mod awssecrets;
pub mod health;
pub mod secrets;
pub mod watch;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pkg_state::registry::StoreError;
use tracing::warn;

/// Error returned by resource handlers, rendered as a plain-text body.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            ApiError::Store(e) => {
                let status = match &e {
                    StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                    StoreError::AlreadyExists { .. } | StoreError::OwnerGone { .. } => {
                        StatusCode::CONFLICT
                    }
                    StoreError::Codec { .. } | StoreError::Backend(_) => {
                        warn!("Store error: {:#}", e);
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.to_string()).into_response()
            }
        }
    }
}
