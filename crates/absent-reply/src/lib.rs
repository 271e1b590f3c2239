//! Reading inbound mail and writing the automatic reply.
//!
//! Everything here is pure: [`InboundMessage::parse`] and
//! [`InboundMessage::screen`] decide whether a message deserves a reply, and
//! [`compose`] renders it. Nothing touches the network or the filesystem.

mod compose;
mod encode;
mod message;

pub mod error;

pub use compose::{compose, Original, RenderedReply, GROUP_SUBJECT_PREFIX, PERSONAL_SUBJECT_PREFIX};
pub use error::{Error, Result};
pub use message::{InboundMessage, Screening, SkipReason};
