//! The absent vacation auto-responder.
//!
//! Given one inbound message and its recipient, decide whether the recipient
//! is away, whether the message deserves an answer and whether the sender was
//! already answered recently; then compose and hand off at most one reply.

pub mod app;
pub mod backend;
pub mod config;
pub mod delivery;
pub mod engine;
pub mod error;

pub use app::{run, Invocation};
pub use config::Config;
pub use engine::{Engine, Outcome, Request};
pub use error::{Error, Result};
