use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::backend::{SecretValue, SecretsBackend};
use crate::error::BackendError;
use pkg_constants::secretsmanager::{
    AMZ_JSON_CONTENT_TYPE, GET_SECRET_VALUE_TARGET, REQUEST_TIMEOUT_SECS, RESOURCE_NOT_FOUND,
};

/// HTTP client for the Secrets Manager `GetSecretValue` action (AWS JSON 1.1).
///
/// Requests are not signed, so this is only for an explicit endpoint that
/// does not require SigV4 (LocalStack, moto, a signing sidecar). AWS itself
/// is reached through `AwsSdkBackend`.
pub struct SecretsManagerClient {
    http: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueRequest<'a> {
    secret_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version_id: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueResponse {
    #[serde(default)]
    secret_string: Option<String>,
    version_id: String,
}

#[derive(Deserialize, Default)]
struct ServiceErrorBody {
    #[serde(rename = "__type", default)]
    error_type: String,
    #[serde(alias = "Message", default)]
    message: String,
}

impl SecretsManagerClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SecretsBackend for SecretsManagerClient {
    fn name(&self) -> &str {
        "secretsmanager"
    }

    async fn get_secret_value(
        &self,
        secret_id: &str,
        version_id: Option<&str>,
    ) -> Result<SecretValue, BackendError> {
        let body = serde_json::to_vec(&GetSecretValueRequest {
            secret_id,
            version_id,
        })
        .map_err(BackendError::Codec)?;

        debug!(
            "GetSecretValue secret_id={} version_id={}",
            secret_id,
            version_id.unwrap_or("<current>")
        );
        let resp = self
            .http
            .post(format!("{}/", self.endpoint))
            .header(CONTENT_TYPE, AMZ_JSON_CONTENT_TYPE)
            .header("X-Amz-Target", GET_SECRET_VALUE_TARGET)
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;

        if !status.is_success() {
            let err: ServiceErrorBody = serde_json::from_slice(&bytes).unwrap_or_default();
            // `__type` may be namespaced, e.g. "com.amazonaws...#ResourceNotFoundException".
            let code = err
                .error_type
                .rsplit('#')
                .next()
                .filter(|c| !c.is_empty())
                .unwrap_or("Unknown")
                .to_string();
            if code == RESOURCE_NOT_FOUND {
                return Err(BackendError::NotFound {
                    secret_id: secret_id.to_string(),
                    message: err.message,
                });
            }
            return Err(BackendError::Service {
                status: status.as_u16(),
                code,
                message: err.message,
            });
        }

        let out: GetSecretValueResponse =
            serde_json::from_slice(&bytes).map_err(BackendError::Codec)?;
        let payload = out
            .secret_string
            .ok_or_else(|| BackendError::MissingString {
                secret_id: secret_id.to_string(),
            })?;
        Ok(SecretValue {
            payload,
            version_id: out.version_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetches_current_version_without_version_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("x-amz-target", GET_SECRET_VALUE_TARGET))
            .and(header("content-type", AMZ_JSON_CONTENT_TYPE))
            .and(body_json(json!({"SecretId": "myteam/db"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ARN": "arn:aws:secretsmanager:us-east-1:123456789012:secret:myteam/db-AbCdEf",
                "Name": "myteam/db",
                "SecretString": "{\"user\":\"admin\"}",
                "VersionId": "v-current",
                "VersionStages": ["AWSCURRENT"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = SecretsManagerClient::new(server.uri()).unwrap();
        let value = client.get_secret_value("myteam/db", None).await.unwrap();
        assert_eq!(value.payload, "{\"user\":\"admin\"}");
        assert_eq!(value.version_id, "v-current");
    }

    #[tokio::test]
    async fn sends_requested_version() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({"SecretId": "myteam/db", "VersionId": "v1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "SecretString": "plain",
                "VersionId": "v1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = SecretsManagerClient::new(server.uri()).unwrap();
        let value = client.get_secret_value("myteam/db", Some("v1")).await.unwrap();
        assert_eq!(value.payload, "plain");
    }

    #[tokio::test]
    async fn maps_service_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({"SecretId": "missing"})))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "__type": "ResourceNotFoundException",
                "Message": "Secrets Manager can't find the specified secret."
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_json(json!({"SecretId": "denied"})))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "__type": "com.amazonaws.secretsmanager#AccessDeniedException",
                "message": "nope"
            })))
            .mount(&server)
            .await;

        let client = SecretsManagerClient::new(server.uri()).unwrap();

        let err = client.get_secret_value("missing", None).await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound { .. }));

        let err = client.get_secret_value("denied", None).await.unwrap_err();
        match err {
            BackendError::Service { status, code, message } => {
                assert_eq!(status, 400);
                assert_eq!(code, "AccessDeniedException");
                assert_eq!(message, "nope");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn binary_only_secret_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "SecretBinary": "AAEC",
                "VersionId": "v1"
            })))
            .mount(&server)
            .await;

        let client = SecretsManagerClient::new(server.uri()).unwrap();
        let err = client.get_secret_value("bin", None).await.unwrap_err();
        assert!(matches!(err, BackendError::MissingString { .. }));
    }
}
