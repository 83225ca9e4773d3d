//! Filesystem path and listen address constants.

// ─── Operator ──────────────────────────────────────────────────────────────

/// Default config file path for the operator.
pub const DEFAULT_OPERATOR_CONFIG: &str = "/etc/aws-secret-operator/config.yaml";

/// Default data directory for the operator state store.
pub const DEFAULT_OPERATOR_DATA_DIR: &str = "/tmp/aws-secret-operator-data";

/// Default port for the operator HTTP API.
pub const DEFAULT_OPERATOR_PORT: u16 = 8080;

// ─── CLI ───────────────────────────────────────────────────────────────────

/// Default API endpoint used by `awssecretctl`.
pub const DEFAULT_API_ENDPOINT: &str = "http://127.0.0.1:8080";
