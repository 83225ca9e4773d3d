//! In-memory `ClusterStore` with write accounting and injectable failures.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::store::ClusterStore;
use pkg_state::registry::StoreError;
use pkg_types::awssecret::{AwsSecret, AwsSecretSpec};
use pkg_types::meta::ObjectKey;
use pkg_types::secret::Secret;

#[derive(Default)]
pub struct FakeStore {
    decls: Mutex<BTreeMap<ObjectKey, AwsSecret>>,
    secrets: Mutex<BTreeMap<ObjectKey, Secret>>,
    creates: AtomicUsize,
    updates: AtomicUsize,
    pub fail_writes: AtomicBool,
}

impl FakeStore {
    pub fn put_decl(&self, ns: &str, name: &str, spec: AwsSecretSpec) -> AwsSecret {
        let decl = AwsSecret {
            id: format!("uid-{}-{}", ns, name),
            name: name.to_string(),
            namespace: ns.to_string(),
            spec,
            resource_version: 1,
            created_at: Utc::now(),
        };
        self.decls
            .lock()
            .unwrap()
            .insert(decl.key(), decl.clone());
        decl
    }

    /// Seed a Secret as if some earlier writer had stored it.
    pub fn put_secret(&self, secret: Secret) {
        self.secrets.lock().unwrap().insert(secret.key(), secret);
    }

    pub fn secret(&self, key: &ObjectKey) -> Option<Secret> {
        self.secrets.lock().unwrap().get(key).cloned()
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.creates() + self.updates()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow::anyhow!("store unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterStore for FakeStore {
    async fn get_awssecret(&self, key: &ObjectKey) -> Result<Option<AwsSecret>, StoreError> {
        Ok(self.decls.lock().unwrap().get(key).cloned())
    }

    async fn list_awssecrets(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<AwsSecret>, StoreError> {
        Ok(self
            .decls
            .lock()
            .unwrap()
            .values()
            .filter(|d| namespace.is_none_or(|ns| d.namespace == ns))
            .cloned()
            .collect())
    }

    async fn get_secret(&self, key: &ObjectKey) -> Result<Option<Secret>, StoreError> {
        Ok(self.secret(key))
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        self.check_writable()?;
        let mut secrets = self.secrets.lock().unwrap();
        let key = secret.key();
        if secrets.contains_key(&key) {
            return Err(StoreError::AlreadyExists { kind: "secret", key });
        }
        let mut stored = secret.clone();
        stored.fold_string_data();
        stored.resource_version = 1;
        secrets.insert(key, stored.clone());
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(stored)
    }

    async fn update_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        self.check_writable()?;
        let mut secrets = self.secrets.lock().unwrap();
        let key = secret.key();
        let Some(current) = secrets.get(&key) else {
            return Err(StoreError::NotFound { kind: "secret", key });
        };
        let mut stored = secret.clone();
        stored.fold_string_data();
        stored.resource_version = current.resource_version + 1;
        secrets.insert(key, stored.clone());
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(stored)
    }
}
