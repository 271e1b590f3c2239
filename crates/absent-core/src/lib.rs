//! Core types and capability traits for the absent auto-responder.
//!
//! This crate is deliberately free of network and database dependencies.
//! Backends implement [`lookup::PolicyLookup`] and [`store::SuppressionStore`];
//! the `absent` crate selects one of each per invocation.

// We intentionally use native `async fn` in trait impls (stabilised in Rust
// 1.75). Suppress the advisory lint about `Send` bounds on returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod identity;
pub mod lookup;
pub mod policy;
pub mod store;
pub mod suppression;

pub use error::{Error, Result};
pub use identity::Identity;
pub use policy::{Policy, Window};
pub use suppression::{Claim, SuppressionKey, SuppressionRecord};
