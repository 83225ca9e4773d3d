//! External value resolution: fetching a versioned secret payload from the
//! secret store and decoding it into Secret data.

pub mod aws;
pub mod backend;
pub mod client;
pub mod decode;
pub mod error;
pub mod memory;
pub mod resolver;

pub use backend::{SecretValue, SecretsBackend};
pub use error::{BackendError, ResolveError};
pub use resolver::{DecodedData, Encoding, Resolved, Resolver};
