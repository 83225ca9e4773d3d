use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::backend::{SecretValue, SecretsBackend};
use crate::error::BackendError;

/// Versioned secret store held in process memory.
/// Serves the most recently written version when no version is requested.
#[derive(Default)]
pub struct InMemoryBackend {
    secrets: RwLock<HashMap<String, Versions>>,
    calls: AtomicUsize,
}

#[derive(Default)]
struct Versions {
    by_id: HashMap<String, String>,
    current: String,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a new version with a generated id and make it current.
    pub async fn put_secret_value(&self, secret_id: &str, payload: &str) -> String {
        let version_id = Uuid::new_v4().to_string();
        self.put_secret_version(secret_id, &version_id, payload).await;
        version_id
    }

    /// Write a version with an explicit id and make it current.
    pub async fn put_secret_version(&self, secret_id: &str, version_id: &str, payload: &str) {
        let mut secrets = self.secrets.write().await;
        let versions = secrets.entry(secret_id.to_string()).or_default();
        versions
            .by_id
            .insert(version_id.to_string(), payload.to_string());
        versions.current = version_id.to_string();
    }

    /// Number of `get_secret_value` calls served so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SecretsBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_secret_value(
        &self,
        secret_id: &str,
        version_id: Option<&str>,
    ) -> Result<SecretValue, BackendError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let secrets = self.secrets.read().await;
        let not_found = |message: String| BackendError::NotFound {
            secret_id: secret_id.to_string(),
            message,
        };
        let versions = secrets
            .get(secret_id)
            .ok_or_else(|| not_found("no such secret".to_string()))?;

        let version_id = version_id.unwrap_or(versions.current.as_str());
        let payload = versions
            .by_id
            .get(version_id)
            .ok_or_else(|| not_found(format!("no version {}", version_id)))?;

        Ok(SecretValue {
            payload: payload.clone(),
            version_id: version_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_current_or_requested_version() {
        let backend = InMemoryBackend::new();
        backend.put_secret_version("S", "V1", "one").await;
        let v2 = backend.put_secret_value("S", "two").await;

        let current = backend.get_secret_value("S", None).await.unwrap();
        assert_eq!(current.payload, "two");
        assert_eq!(current.version_id, v2);

        let old = backend.get_secret_value("S", Some("V1")).await.unwrap();
        assert_eq!(old.payload, "one");

        assert!(backend.get_secret_value("S", Some("V9")).await.is_err());
        assert!(backend.get_secret_value("other", None).await.is_err());
        assert_eq!(backend.calls(), 4);
    }
}
