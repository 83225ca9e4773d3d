use async_trait::async_trait;

use crate::error::BackendError;

/// A secret payload together with the version the store actually served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretValue {
    pub payload: String,
    pub version_id: String,
}

/// Pluggable secret store.
/// Implementations: `AwsSdkBackend` (signed, AWS), `SecretsManagerClient`
/// (unsigned HTTP to an explicit endpoint), `InMemoryBackend`.
#[async_trait]
pub trait SecretsBackend: Send + Sync {
    /// Human-readable name of this backend.
    fn name(&self) -> &str;

    /// Fetch one version of a secret. `None` asks for the version the store
    /// currently serves.
    async fn get_secret_value(
        &self,
        secret_id: &str,
        version_id: Option<&str>,
    ) -> Result<SecretValue, BackendError>;
}
