//! AWS Secrets Manager wire constants.

/// Default region when neither flag nor config provides one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// `X-Amz-Target` header value for the GetSecretValue action.
pub const GET_SECRET_VALUE_TARGET: &str = "secretsmanager.GetSecretValue";

/// Content type of the AWS JSON 1.1 protocol.
pub const AMZ_JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Service error code returned when the secret id or version does not exist.
pub const RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";

/// Per-request timeout for calls to the secret store.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;
