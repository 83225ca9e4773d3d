use pkg_secrets::ResolveError;
use pkg_state::registry::StoreError;
use pkg_types::meta::ObjectKey;
use std::fmt;
use thiserror::Error;

/// Which reference of the declaration a resolution was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretRole {
    DataFrom,
    StringDataFrom,
}

impl fmt::Display for SecretRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretRole::DataFrom => write!(f, "dataFrom"),
            SecretRole::StringDataFrom => write!(f, "stringDataFrom"),
        }
    }
}

#[derive(Debug, Error)]
#[error("failed to get json secret as map for {role}")]
pub struct BuildError {
    pub role: SecretRole,
    #[source]
    pub source: ResolveError,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to compute secret for cr")]
    Build(#[from] BuildError),

    #[error("failed to {op} {key}")]
    Store {
        op: &'static str,
        key: ObjectKey,
        #[source]
        source: StoreError,
    },
}

/// `outer: cause: root cause`, for single-line logs.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_secrets::BackendError;

    #[test]
    fn chain_includes_role_and_root_cause() {
        let err = ReconcileError::from(BuildError {
            role: SecretRole::StringDataFrom,
            source: ResolveError::UpstreamUnavailable {
                secret_id: "S".into(),
                source: BackendError::NotFound {
                    secret_id: "S".into(),
                    message: "gone".into(),
                },
            },
        });
        assert_eq!(
            error_chain(&err),
            "failed to compute secret for cr: failed to get json secret as map for stringDataFrom: \
             failed to get secret value for S: secret S not found: gone"
        );
    }
}
