//! Redis backend for the absent suppression store.
//!
//! Check-and-set runs as server-side Lua scripts, so a claim is atomic across
//! every invocation talking to the same Redis instance.

mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{RedisStore, DEFAULT_PORT, DEFAULT_PREFIX};

#[cfg(test)]
mod tests;
