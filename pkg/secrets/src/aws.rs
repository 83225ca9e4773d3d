use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_secretsmanager::Client;
use aws_sdk_secretsmanager::config::Region;
use aws_sdk_secretsmanager::error::{DisplayErrorContext, ProvideErrorMetadata};
use tracing::debug;

use crate::backend::{SecretValue, SecretsBackend};
use crate::error::BackendError;

/// AWS Secrets Manager through the AWS SDK.
///
/// Requests are SigV4-signed with credentials from the SDK's default
/// provider chain (environment, shared profile, web identity, instance
/// metadata).
pub struct AwsSdkBackend {
    client: Client,
}

impl AwsSdkBackend {
    /// Backend for the public endpoint of `region`.
    pub async fn for_region(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self::from_client(Client::new(&config))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn region(&self) -> Option<&str> {
        self.client.config().region().map(|r| r.as_ref())
    }
}

#[async_trait]
impl SecretsBackend for AwsSdkBackend {
    fn name(&self) -> &str {
        "aws-sdk"
    }

    async fn get_secret_value(
        &self,
        secret_id: &str,
        version_id: Option<&str>,
    ) -> Result<SecretValue, BackendError> {
        debug!(
            "GetSecretValue secret_id={} version_id={}",
            secret_id,
            version_id.unwrap_or("<current>")
        );
        let result = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .set_version_id(version_id.map(str::to_string))
            .send()
            .await;

        let out = match result {
            Ok(out) => out,
            Err(err) => {
                let service = err.as_service_error();
                if service.is_some_and(|e| e.is_resource_not_found_exception()) {
                    return Err(BackendError::NotFound {
                        secret_id: secret_id.to_string(),
                        message: service
                            .and_then(|e| e.message())
                            .unwrap_or_default()
                            .to_string(),
                    });
                }
                return Err(BackendError::Sdk {
                    code: service
                        .and_then(|e| e.code())
                        .unwrap_or("Unknown")
                        .to_string(),
                    message: DisplayErrorContext(&err).to_string(),
                });
            }
        };

        let payload = out
            .secret_string()
            .ok_or_else(|| BackendError::MissingString {
                secret_id: secret_id.to_string(),
            })?
            .to_string();
        Ok(SecretValue {
            payload,
            version_id: out.version_id().unwrap_or_default().to_string(),
        })
    }
}
