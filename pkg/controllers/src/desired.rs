use std::sync::Arc;
use tracing::{enabled, trace, Level};

use crate::error::{BuildError, SecretRole};
use pkg_metrics::{MetricsRegistry, RESOLVE_ERRORS_TOTAL, RESOLVE_TOTAL};
use pkg_secrets::{ResolveError, Resolver};
use pkg_types::awssecret::AwsSecret;
use pkg_types::secret::Secret;

/// Computes the Secret an AWSSecret declaration should produce.
#[derive(Clone)]
pub struct DesiredStateBuilder {
    resolver: Resolver,
    metrics: Arc<MetricsRegistry>,
}

impl DesiredStateBuilder {
    pub fn new(resolver: Resolver, metrics: Arc<MetricsRegistry>) -> Self {
        Self { resolver, metrics }
    }

    /// Build the desired Secret, same name and namespace as `decl`.
    ///
    /// Refs missing either `secretId` or `versionId` are skipped without a
    /// lookup. Labels and annotations are only set when the declaration
    /// carries `metadata`.
    pub async fn build(&self, decl: &AwsSecret) -> Result<Secret, BuildError> {
        let mut secret = Secret::new(&decl.namespace, &decl.name);

        let string_ref = &decl.spec.string_data_from.secrets_manager_secret_ref;
        if string_ref.is_configured() {
            self.metrics.counter_inc(RESOLVE_TOTAL);
            secret.string_data = self
                .resolver
                .resolve_string_data(string_ref)
                .await
                .map_err(|source| self.failed(SecretRole::StringDataFrom, source))?;
        }

        let data_ref = &decl.spec.data_from.secrets_manager_secret_ref;
        if data_ref.is_configured() {
            self.metrics.counter_inc(RESOLVE_TOTAL);
            secret.data = self
                .resolver
                .resolve_data(data_ref)
                .await
                .map_err(|source| self.failed(SecretRole::DataFrom, source))?;
        }

        secret.secret_type = decl.spec.secret_type.clone();
        if let Some(meta) = &decl.spec.metadata {
            secret.labels = meta.labels.clone();
            secret.annotations = meta.annotations.clone();
        }

        if enabled!(Level::TRACE) {
            let string_keys: Vec<&str> = secret.string_data.keys().map(String::as_str).collect();
            let data_keys: Vec<&str> = secret.data.keys().map(String::as_str).collect();
            trace!(
                "Desired secret {}: type={:?} labels={:?} annotations={:?} stringData keys={:?} data keys={:?}",
                secret.key(),
                secret.secret_type,
                secret.labels,
                secret.annotations,
                string_keys,
                data_keys
            );
        }

        Ok(secret)
    }

    fn failed(&self, role: SecretRole, source: ResolveError) -> BuildError {
        self.metrics.counter_inc(RESOLVE_ERRORS_TOTAL);
        BuildError { role, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_constants::controller::AWS_VERSION_ID_KEY;
    use pkg_secrets::memory::InMemoryBackend;
    use pkg_types::awssecret::{AwsSecretSpec, SecretMeta, SecretsManagerSecretRef};
    use std::collections::BTreeMap;

    fn decl(spec: AwsSecretSpec) -> AwsSecret {
        AwsSecret {
            id: "uid-1".into(),
            name: "example-secret".into(),
            namespace: "default".into(),
            spec,
            resource_version: 1,
            created_at: chrono::Utc::now(),
        }
    }

    async fn builder() -> (Arc<InMemoryBackend>, DesiredStateBuilder) {
        let backend = Arc::new(InMemoryBackend::new());
        backend
            .put_secret_version("S", "V1", r#"{"value":"v1value"}"#)
            .await;
        backend
            .put_secret_version("B", "B1", r#"{"token":"c2VjcmV0"}"#)
            .await;
        let builder = DesiredStateBuilder::new(
            Resolver::new(backend.clone()),
            Arc::new(MetricsRegistry::for_operator()),
        );
        (backend, builder)
    }

    #[tokio::test]
    async fn fills_both_maps_and_copies_type() {
        let (_, builder) = builder().await;
        let mut spec = AwsSecretSpec::default();
        spec.string_data_from.secrets_manager_secret_ref = SecretsManagerSecretRef::new("S", "V1");
        spec.data_from.secrets_manager_secret_ref = SecretsManagerSecretRef::new("B", "B1");
        spec.secret_type = "Opaque".into();

        let secret = builder.build(&decl(spec)).await.unwrap();
        assert_eq!(secret.key().to_string(), "default/example-secret");
        assert_eq!(secret.string_data["value"], "v1value");
        assert_eq!(secret.string_data[AWS_VERSION_ID_KEY], "V1");
        assert_eq!(secret.data["token"], b"secret");
        assert_eq!(secret.data[AWS_VERSION_ID_KEY], b"B1");
        assert_eq!(secret.secret_type, "Opaque");
        assert!(secret.labels.is_none());
        assert!(secret.annotations.is_none());
    }

    #[tokio::test]
    async fn partial_refs_make_no_lookup() {
        let (backend, builder) = builder().await;
        let mut spec = AwsSecretSpec::default();
        spec.string_data_from.secrets_manager_secret_ref = SecretsManagerSecretRef::new("S", "");
        spec.data_from.secrets_manager_secret_ref = SecretsManagerSecretRef::new("", "B1");

        let secret = builder.build(&decl(spec)).await.unwrap();
        assert!(secret.string_data.is_empty());
        assert!(secret.data.is_empty());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn metadata_presence_is_preserved() {
        let (_, builder) = builder().await;
        let mut spec = AwsSecretSpec::default();
        spec.metadata = Some(SecretMeta {
            labels: Some(BTreeMap::new()),
            annotations: None,
        });

        let secret = builder.build(&decl(spec)).await.unwrap();
        assert_eq!(secret.labels, Some(BTreeMap::new()));
        assert!(secret.annotations.is_none());
    }

    #[tokio::test]
    async fn errors_carry_the_role() {
        let (_, builder) = builder().await;
        let mut spec = AwsSecretSpec::default();
        spec.data_from.secrets_manager_secret_ref = SecretsManagerSecretRef::new("S", "V1");

        // `{"value":"v1value"}` is not base64, so BYTES decoding rejects it.
        let err = builder.build(&decl(spec)).await.unwrap_err();
        assert_eq!(err.role, SecretRole::DataFrom);
        assert!(matches!(err.source, ResolveError::MalformedPayload { .. }));
        assert_eq!(
            builder.metrics.counter_value(RESOLVE_ERRORS_TOTAL, &[]),
            1
        );
    }
}
