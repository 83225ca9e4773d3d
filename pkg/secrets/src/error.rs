use thiserror::Error;

/// Failure of a single call to the secret store.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("secret {secret_id} not found: {message}")]
    NotFound { secret_id: String, message: String },

    #[error("secret store returned {code} (HTTP {status}): {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    #[error("secret store call failed ({code}): {message}")]
    Sdk { code: String, message: String },

    #[error("secret {secret_id} has no string payload")]
    MissingString { secret_id: String },

    #[error("request to secret store failed")]
    Transport(#[from] reqwest::Error),

    #[error("failed to encode or decode secret store message")]
    Codec(#[source] serde_json::Error),
}

/// Failure to turn a secret reference into Secret data.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to get secret value for {secret_id}")]
    UpstreamUnavailable {
        secret_id: String,
        #[source]
        source: BackendError,
    },

    #[error("malformed payload in {secret_id}: {reason}")]
    MalformedPayload { secret_id: String, reason: String },
}
