use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::meta::ObjectKey;

/// Declaration of a Secret whose content comes from AWS Secrets Manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsSecret {
    /// Store-assigned uid, referenced by owned Secrets.
    pub id: String,
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub spec: AwsSecretSpec,
    #[serde(default)]
    pub resource_version: u64,
    pub created_at: DateTime<Utc>,
}

impl AwsSecret {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }
}

/// Desired state of an AWSSecret.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsSecretSpec {
    /// Builds the Secret's `data`; values in the upstream payload are base64.
    #[serde(default)]
    pub data_from: DataFrom,

    /// Builds the Secret's `stringData` from unencoded upstream strings.
    #[serde(default)]
    pub string_data_from: StringDataFrom,

    /// Copied verbatim to the Secret's `type`.
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub secret_type: String,

    /// Labels and annotations for the resulting Secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SecretMeta>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StringDataFrom {
    #[serde(default)]
    pub secrets_manager_secret_ref: SecretsManagerSecretRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFrom {
    #[serde(default)]
    pub secrets_manager_secret_ref: SecretsManagerSecretRef,
}

/// Points at one version of a Secrets Manager secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretsManagerSecretRef {
    /// `--secret-id`: name or ARN of the secret.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret_id: String,
    /// `--version-id`: empty means the version currently served.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version_id: String,
}

impl SecretsManagerSecretRef {
    pub fn new(secret_id: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            secret_id: secret_id.into(),
            version_id: version_id.into(),
        }
    }

    /// A ref contributes data only when both fields are set; a half-filled
    /// ref is treated as not configured.
    pub fn is_configured(&self) -> bool {
        !self.secret_id.is_empty() && !self.version_id.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// Kubernetes-style manifest accepted by `awssecretctl apply`.
///
/// ```yaml
/// apiVersion: mumoshu.github.io/v1alpha1
/// kind: AWSSecret
/// metadata:
///   name: example-secret
///   namespace: default
/// spec:
///   type: Opaque
///   stringDataFrom:
///     secretsManagerSecretRef:
///       secretId: myteam/mysecret
///       versionId: 9e0d4f7a-1b2c-4d3e-8f90-123456789abc
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsSecretManifest {
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    pub metadata: ManifestMeta,
    #[serde(default)]
    pub spec: AwsSecretSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMeta {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_ref_is_not_configured() {
        assert!(!SecretsManagerSecretRef::default().is_configured());
        assert!(!SecretsManagerSecretRef::new("s", "").is_configured());
        assert!(!SecretsManagerSecretRef::new("", "v").is_configured());
        assert!(SecretsManagerSecretRef::new("s", "v").is_configured());
    }

    #[test]
    fn spec_uses_crd_field_names() {
        let json = r#"{
            "stringDataFrom": {"secretsManagerSecretRef": {"secretId": "S", "versionId": "V1"}},
            "type": "Opaque",
            "metadata": {"labels": {"label1": "labelv1"}}
        }"#;
        let spec: AwsSecretSpec = serde_json::from_str(json).unwrap();
        assert_eq!(
            spec.string_data_from.secrets_manager_secret_ref,
            SecretsManagerSecretRef::new("S", "V1")
        );
        assert_eq!(spec.data_from, DataFrom::default());
        assert_eq!(spec.secret_type, "Opaque");
        let meta = spec.metadata.unwrap();
        assert_eq!(meta.labels.unwrap()["label1"], "labelv1");
        assert!(meta.annotations.is_none());
    }

    #[test]
    fn manifest_defaults_namespace() {
        let yaml = "kind: AWSSecret\nmetadata:\n  name: example-secret\nspec:\n  type: Opaque\n";
        let manifest: AwsSecretManifest = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(manifest.metadata.namespace, "default");
        assert_eq!(manifest.spec.secret_type, "Opaque");
    }
}
