pub mod awssecret;
pub mod config;
pub mod meta;
pub mod secret;
pub mod validate;
