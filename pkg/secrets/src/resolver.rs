use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::backend::{SecretValue, SecretsBackend};
use crate::decode::{decode_bytes_map, decode_string_map};
use crate::error::ResolveError;
use pkg_constants::controller::AWS_VERSION_ID_KEY;
use pkg_types::awssecret::SecretsManagerSecretRef;

/// Target representation of a decoded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Tolerant decoding into `stringData`.
    String,
    /// Strict decoding into `data`.
    Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedData {
    Strings(BTreeMap<String, String>),
    Bytes(BTreeMap<String, Vec<u8>>),
}

/// Upstream value plus its decoded form, `AWSVersionId` already injected.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub value: SecretValue,
    pub data: DecodedData,
}

/// Turns secret references into Secret data. Holds no cache: every call
/// goes to the backend.
#[derive(Clone)]
pub struct Resolver {
    backend: Arc<dyn SecretsBackend>,
}

impl Resolver {
    pub fn new(backend: Arc<dyn SecretsBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub async fn resolve(
        &self,
        secret_ref: &SecretsManagerSecretRef,
        encoding: Encoding,
    ) -> Result<Resolved, ResolveError> {
        let secret_id = secret_ref.secret_id.as_str();
        let version_id = Some(secret_ref.version_id.as_str()).filter(|v| !v.is_empty());

        let value = self
            .backend
            .get_secret_value(secret_id, version_id)
            .await
            .map_err(|source| ResolveError::UpstreamUnavailable {
                secret_id: secret_id.to_string(),
                source,
            })?;
        debug!(
            "Resolved {} at version {} via {}",
            secret_id,
            value.version_id,
            self.backend.name()
        );

        let data = match encoding {
            Encoding::String => {
                let mut map = decode_string_map(&value.payload);
                map.insert(AWS_VERSION_ID_KEY.to_string(), value.version_id.clone());
                DecodedData::Strings(map)
            }
            Encoding::Bytes => {
                let mut map = decode_bytes_map(&value.payload).map_err(|reason| {
                    ResolveError::MalformedPayload {
                        secret_id: secret_id.to_string(),
                        reason,
                    }
                })?;
                map.insert(
                    AWS_VERSION_ID_KEY.to_string(),
                    value.version_id.clone().into_bytes(),
                );
                DecodedData::Bytes(map)
            }
        };

        Ok(Resolved { value, data })
    }

    /// Resolve in STRING mode, for `stringData`.
    pub async fn resolve_string_data(
        &self,
        secret_ref: &SecretsManagerSecretRef,
    ) -> Result<BTreeMap<String, String>, ResolveError> {
        match self.resolve(secret_ref, Encoding::String).await?.data {
            DecodedData::Strings(map) => Ok(map),
            DecodedData::Bytes(map) => Ok(map
                .into_iter()
                .map(|(k, v)| (k, String::from_utf8_lossy(&v).into_owned()))
                .collect()),
        }
    }

    /// Resolve in BYTES mode, for `data`.
    pub async fn resolve_data(
        &self,
        secret_ref: &SecretsManagerSecretRef,
    ) -> Result<BTreeMap<String, Vec<u8>>, ResolveError> {
        match self.resolve(secret_ref, Encoding::Bytes).await?.data {
            DecodedData::Bytes(map) => Ok(map),
            DecodedData::Strings(map) => Ok(map
                .into_iter()
                .map(|(k, v)| (k, v.into_bytes()))
                .collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;

    async fn resolver_with(payload: &str) -> (Arc<InMemoryBackend>, Resolver) {
        let backend = Arc::new(InMemoryBackend::new());
        backend.put_secret_version("S", "V1", payload).await;
        let resolver = Resolver::new(backend.clone());
        (backend, resolver)
    }

    #[tokio::test]
    async fn string_mode_injects_served_version() {
        let (_, resolver) = resolver_with(r#"{"value":"v1value","AWSVersionId":"spoofed"}"#).await;

        let map = resolver
            .resolve_string_data(&SecretsManagerSecretRef::new("S", "V1"))
            .await
            .unwrap();
        assert_eq!(map["value"], "v1value");
        assert_eq!(map[AWS_VERSION_ID_KEY], "V1");
    }

    #[tokio::test]
    async fn empty_version_resolves_current() {
        let (backend, resolver) = resolver_with("first").await;
        let v2 = backend.put_secret_value("S", "second").await;

        let resolved = resolver
            .resolve(&SecretsManagerSecretRef::new("S", ""), Encoding::String)
            .await
            .unwrap();
        assert_eq!(resolved.value.version_id, v2);
        match resolved.data {
            DecodedData::Strings(map) => {
                assert_eq!(map["data"], "second");
                assert_eq!(map[AWS_VERSION_ID_KEY], v2);
            }
            other => panic!("unexpected data: {other:?}"),
        }
    }

    #[tokio::test]
    async fn bytes_mode_is_strict() {
        let (_, resolver) = resolver_with("not json").await;

        let err = resolver
            .resolve_data(&SecretsManagerSecretRef::new("S", "V1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::MalformedPayload { .. }));
    }

    #[tokio::test]
    async fn bytes_mode_injects_version_as_bytes() {
        let (_, resolver) = resolver_with(r#"{"token":"c2VjcmV0"}"#).await;

        let map = resolver
            .resolve_data(&SecretsManagerSecretRef::new("S", "V1"))
            .await
            .unwrap();
        assert_eq!(map["token"], b"secret");
        assert_eq!(map[AWS_VERSION_ID_KEY], b"V1");
    }

    #[tokio::test]
    async fn backend_failure_is_upstream_unavailable() {
        let (backend, resolver) = resolver_with("x").await;

        let err = resolver
            .resolve(&SecretsManagerSecretRef::new("missing", ""), Encoding::String)
            .await
            .unwrap_err();
        match err {
            ResolveError::UpstreamUnavailable { secret_id, .. } => assert_eq!(secret_id, "missing"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(backend.calls(), 1);
    }
}
