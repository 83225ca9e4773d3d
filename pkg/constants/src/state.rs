//! State store key layout.

/// Prefix under which `AWSSecret` declarations are stored.
/// Full key = `/registry/awssecrets/{namespace}/{name}`.
pub const AWSSECRETS_PREFIX: &str = "/registry/awssecrets/";

/// Prefix under which derived `Secret` objects are stored.
/// Full key = `/registry/secrets/{namespace}/{name}`.
pub const SECRETS_PREFIX: &str = "/registry/secrets/";

/// Number of recent watch events retained for `events_since` replay.
pub const EVENT_LOG_CAPACITY: usize = 1024;

/// Capacity of the live watch broadcast channel.
pub const EVENT_BROADCAST_CAPACITY: usize = 1024;
