use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::StateStore;
use pkg_constants::controller::AWSSECRET_KIND;
use pkg_constants::state::{AWSSECRETS_PREFIX, SECRETS_PREFIX};
use pkg_types::awssecret::{AwsSecret, AwsSecretSpec};
use pkg_types::meta::ObjectKey;
use pkg_types::secret::Secret;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: ObjectKey },

    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: &'static str, key: ObjectKey },

    #[error("owner {owner} (uid {uid}) of secret {key} no longer exists")]
    OwnerGone {
        key: ObjectKey,
        owner: ObjectKey,
        uid: String,
    },

    #[error("failed to encode or decode {key}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

const SECRET_KIND: &str = "secret";

/// Typed access to declarations and secrets kept in the `StateStore`.
///
/// Writes go through a single lock so that check-then-write sequences
/// (create-if-absent, owner checks, cascading deletes) are atomic with
/// respect to each other.
#[derive(Clone)]
pub struct Registry {
    store: StateStore,
    write_lock: Arc<Mutex<()>>,
}

impl Registry {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    // ============================================================
    // AWSSecrets
    // ============================================================

    pub async fn get_awssecret(&self, key: &ObjectKey) -> Result<Option<AwsSecret>, StoreError> {
        self.read(&key.registry_key(AWSSECRETS_PREFIX)).await
    }

    /// All declarations, optionally restricted to one namespace.
    pub async fn list_awssecrets(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<AwsSecret>, StoreError> {
        let prefix = match namespace {
            Some(ns) => format!("{}{}/", AWSSECRETS_PREFIX, ns),
            None => AWSSECRETS_PREFIX.to_string(),
        };
        self.list(&prefix).await
    }

    /// Create the declaration or replace its spec. Returns the stored object
    /// and whether it was newly created.
    pub async fn apply_awssecret(
        &self,
        key: &ObjectKey,
        spec: AwsSecretSpec,
    ) -> Result<(AwsSecret, bool), StoreError> {
        let _guard = self.write_lock.lock().await;
        let raw_key = key.registry_key(AWSSECRETS_PREFIX);

        let (decl, created) = match self.read::<AwsSecret>(&raw_key).await? {
            Some(mut existing) => {
                existing.spec = spec;
                existing.resource_version += 1;
                (existing, false)
            }
            None => (
                AwsSecret {
                    id: Uuid::new_v4().to_string(),
                    name: key.name.clone(),
                    namespace: key.namespace.clone(),
                    spec,
                    resource_version: 1,
                    created_at: Utc::now(),
                },
                true,
            ),
        };

        self.write(&raw_key, &decl).await?;
        info!(
            "{} awssecret {} (version {})",
            if created { "Created" } else { "Updated" },
            key,
            decl.resource_version
        );
        Ok((decl, created))
    }

    /// Delete a declaration and every Secret it owns. Returns `false` when
    /// the declaration did not exist.
    pub async fn delete_awssecret(&self, key: &ObjectKey) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let raw_key = key.registry_key(AWSSECRETS_PREFIX);

        let Some(decl) = self.read::<AwsSecret>(&raw_key).await? else {
            return Ok(false);
        };
        self.store.delete(&raw_key).await?;

        let prefix = format!("{}{}/", SECRETS_PREFIX, key.namespace);
        let entries = self.store.list_prefix(&prefix).await?;
        for (secret_key, secret) in decode_entries::<Secret>(entries) {
            if secret.is_owned_by(&decl.id) {
                self.store.delete(&secret_key).await?;
                info!("Garbage collected secret {} owned by {}", secret.key(), key);
            }
        }

        info!("Deleted awssecret {}", key);
        Ok(true)
    }

    // ============================================================
    // Secrets
    // ============================================================

    pub async fn get_secret(&self, key: &ObjectKey) -> Result<Option<Secret>, StoreError> {
        self.read(&key.registry_key(SECRETS_PREFIX)).await
    }

    pub async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>, StoreError> {
        self.list(&format!("{}{}/", SECRETS_PREFIX, namespace)).await
    }

    /// Store a new secret. Fails if one with the same identity exists, or
    /// if the AWSSecret it names as owner is gone.
    pub async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let _guard = self.write_lock.lock().await;
        let key = secret.key();
        let raw_key = key.registry_key(SECRETS_PREFIX);

        if self.store.get(&raw_key).await?.is_some() {
            return Err(StoreError::AlreadyExists {
                kind: SECRET_KIND,
                key,
            });
        }
        self.check_owner(secret).await?;

        let mut stored = secret.clone();
        stored.fold_string_data();
        stored.id = Uuid::new_v4().to_string();
        stored.resource_version = 1;
        stored.created_at = Utc::now();

        self.write(&raw_key, &stored).await?;
        Ok(stored)
    }

    /// Replace an existing secret wholesale. The caller's `resource_version`
    /// is ignored; the stored one is bumped. Fails like `create_secret` when
    /// the owner is gone.
    pub async fn update_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let _guard = self.write_lock.lock().await;
        let key = secret.key();
        let raw_key = key.registry_key(SECRETS_PREFIX);

        let Some(current) = self.read::<Secret>(&raw_key).await? else {
            return Err(StoreError::NotFound {
                kind: SECRET_KIND,
                key,
            });
        };
        self.check_owner(secret).await?;

        let mut stored = secret.clone();
        stored.fold_string_data();
        stored.id = current.id;
        stored.created_at = current.created_at;
        stored.resource_version = current.resource_version + 1;

        self.write(&raw_key, &stored).await?;
        Ok(stored)
    }

    /// An AWSSecret owner reference must name a stored declaration with
    /// the same uid. Must be called with `write_lock` held.
    async fn check_owner(&self, secret: &Secret) -> Result<(), StoreError> {
        let Some(owner) = secret
            .owner_ref
            .as_ref()
            .filter(|o| o.kind == AWSSECRET_KIND)
        else {
            return Ok(());
        };
        let owner_key = ObjectKey::new(&secret.namespace, &owner.name);
        let live: Option<AwsSecret> = self.read(&owner_key.registry_key(AWSSECRETS_PREFIX)).await?;
        match live {
            Some(decl) if decl.id == owner.uid => Ok(()),
            _ => Err(StoreError::OwnerGone {
                key: secret.key(),
                owner: owner_key,
                uid: owner.uid.clone(),
            }),
        }
    }

    // ============================================================
    // Encoding helpers
    // ============================================================

    async fn read<T: DeserializeOwned>(&self, raw_key: &str) -> Result<Option<T>, StoreError> {
        match self.store.get(raw_key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| StoreError::Codec {
                    key: raw_key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    async fn list<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>, StoreError> {
        let entries = self.store.list_prefix(prefix).await?;
        Ok(decode_entries(entries).into_iter().map(|(_, v)| v).collect())
    }

    async fn write<T: Serialize>(&self, raw_key: &str, value: &T) -> Result<(), StoreError> {
        let data = serde_json::to_vec(value).map_err(|source| StoreError::Codec {
            key: raw_key.to_string(),
            source,
        })?;
        self.store.put(raw_key, &data).await?;
        Ok(())
    }
}

/// Decode listed records, skipping (and reporting) those that do not parse
/// so one bad record cannot hide the rest of a prefix.
fn decode_entries<T: DeserializeOwned>(entries: Vec<(String, Vec<u8>)>) -> Vec<(String, T)> {
    entries
        .into_iter()
        .filter_map(|(key, value)| match serde_json::from_slice(&value) {
            Ok(decoded) => Some((key, decoded)),
            Err(e) => {
                warn!("Skipping undecodable record {}: {}", key, e);
                None
            }
        })
        .collect()
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
