use chrono::{DateTime, Utc};
use pkg_constants::controller::AWS_VERSION_ID_KEY;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::meta::{ObjectKey, OwnerReference};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    /// Store-assigned uid; empty until the secret is created.
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub namespace: String,
    /// Secret data stored as base64-encoded values on the wire.
    #[serde(default, with = "base64_map", skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, Vec<u8>>,
    /// Write-only convenience field, folded into `data` by the store.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub string_data: BTreeMap<String, String>,
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub secret_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_ref: Option<OwnerReference>,
    /// Zero means "unconditional" when sent as an update.
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Secret {
    /// An empty secret with the given identity.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            namespace: namespace.into(),
            data: BTreeMap::new(),
            string_data: BTreeMap::new(),
            secret_type: String::new(),
            labels: None,
            annotations: None,
            owner_ref: None,
            resource_version: 0,
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    /// The served upstream version recorded under `AWSVersionId`.
    /// `stringData` is consulted before `data`; the value is always text.
    pub fn version_anchor(&self) -> Option<Cow<'_, str>> {
        if let Some(v) = self.string_data.get(AWS_VERSION_ID_KEY) {
            return Some(Cow::Borrowed(v.as_str()));
        }
        self.data
            .get(AWS_VERSION_ID_KEY)
            .map(|v| String::from_utf8_lossy(v))
    }

    /// Merge `stringData` into `data` (string values win) and clear it,
    /// the way the cluster API persists secrets.
    pub fn fold_string_data(&mut self) {
        let string_data = std::mem::take(&mut self.string_data);
        for (k, v) in string_data {
            self.data.insert(k, v.into_bytes());
        }
    }

    pub fn is_owned_by(&self, uid: &str) -> bool {
        self.owner_ref.as_ref().is_some_and(|o| o.uid == uid)
    }
}

/// Serde adapter for `BTreeMap<String, Vec<u8>>` with base64 string values.
pub mod base64_map {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<String, Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_map(map.iter().map(|(k, v)| (k, STANDARD.encode(v))))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, Vec<u8>>, D::Error> {
        let encoded = BTreeMap::<String, String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|(k, v)| {
                STANDARD
                    .decode(v.as_bytes())
                    .map(|bytes| (k.clone(), bytes))
                    .map_err(|e| D::Error::custom(format!("key {}: {}", k, e)))
            })
            .collect()
    }
}
