//! SQLite backend for the absent suppression store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Check-and-set runs inside
//! `BEGIN IMMEDIATE` transactions, which SQLite serialises across processes.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{SqliteStore, DEFAULT_BUSY_TIMEOUT};
