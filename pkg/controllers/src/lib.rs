pub mod awssecret;
pub mod desired;
pub mod diff;
pub mod error;
pub mod runner;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;
