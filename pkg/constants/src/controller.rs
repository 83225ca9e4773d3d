//! Reconciliation constants for the AWSSecret controller.

/// Default controller name, used in logs and metrics.
pub const CONTROLLER_NAME: &str = "awssecret-controller";

/// API group/version of the `AWSSecret` kind, recorded in owner references.
pub const AWSSECRET_API_VERSION: &str = "mumoshu.github.io/v1alpha1";

/// Kind name of the declaration, recorded in owner references.
pub const AWSSECRET_KIND: &str = "AWSSecret";

/// Reserved data key carrying the served secret version id.
pub const AWS_VERSION_ID_KEY: &str = "AWSVersionId";

/// Every successful cycle is revisited after this many seconds so that
/// upstream rotation is noticed without a new notification.
pub const REQUEUE_AFTER_SECS: u64 = 300;

/// Default number of identities reconciled concurrently.
pub const DEFAULT_WORKERS: usize = 4;

/// Delay applied to watch notifications so bursts collapse into one cycle.
pub const DEFAULT_DEBOUNCE_MILLIS: u64 = 200;

/// First retry delay after a failed cycle, doubled on each further failure.
pub const ERROR_BACKOFF_BASE_SECS: u64 = 1;

/// Upper bound for the failed-cycle retry delay.
pub const ERROR_BACKOFF_MAX_SECS: u64 = 300;
