use async_trait::async_trait;
use pkg_state::registry::{Registry, StoreError};
use pkg_types::awssecret::AwsSecret;
use pkg_types::meta::ObjectKey;
use pkg_types::secret::Secret;

/// Cluster store operations the AWSSecret controller needs.
/// `Registry` is the production implementation.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn get_awssecret(&self, key: &ObjectKey) -> Result<Option<AwsSecret>, StoreError>;

    async fn list_awssecrets(&self, namespace: Option<&str>)
    -> Result<Vec<AwsSecret>, StoreError>;

    async fn get_secret(&self, key: &ObjectKey) -> Result<Option<Secret>, StoreError>;

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;

    /// Full replace of an existing secret.
    async fn update_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;
}

#[async_trait]
impl ClusterStore for Registry {
    async fn get_awssecret(&self, key: &ObjectKey) -> Result<Option<AwsSecret>, StoreError> {
        Registry::get_awssecret(self, key).await
    }

    async fn list_awssecrets(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<AwsSecret>, StoreError> {
        Registry::list_awssecrets(self, namespace).await
    }

    async fn get_secret(&self, key: &ObjectKey) -> Result<Option<Secret>, StoreError> {
        Registry::get_secret(self, key).await
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        Registry::create_secret(self, secret).await
    }

    async fn update_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        Registry::update_secret(self, secret).await
    }
}
