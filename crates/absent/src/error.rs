//! Error type for `absent` and its mapping to process exit statuses.

use thiserror::Error;

use crate::delivery::DeliveryError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ─── sysexits.h ──────────────────────────────────────────────────────────────

pub const EX_USAGE: i32 = 64;
pub const EX_DATAERR: i32 = 65;
pub const EX_TEMPFAIL: i32 = 75;

#[derive(Debug, Error)]
pub enum Error {
  #[error("configuration error: {0}")]
  Config(#[from] config::ConfigError),

  #[error("backend {backend:?} selected but the [{section}] section is missing")]
  MissingSection {
    backend: &'static str,
    section: &'static str,
  },

  #[error("invalid recipient: {0}")]
  Recipient(#[source] absent_core::Error),

  #[error(transparent)]
  Message(#[from] absent_reply::Error),

  #[error("policy lookup failed: {0}")]
  Lookup(#[source] BoxError),

  #[error("suppression store failed: {0}")]
  Store(#[source] BoxError),

  #[error(transparent)]
  Delivery(#[from] DeliveryError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  pub fn lookup(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Lookup(Box::new(e))
  }

  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  /// The sysexits status the mail system should see for this error.
  ///
  /// Anything that might succeed on a later attempt is `EX_TEMPFAIL`, so the
  /// message is requeued rather than bounced.
  pub fn exit_code(&self) -> i32 {
    match self {
      Self::Recipient(_) => EX_USAGE,
      Self::Message(_) => EX_DATAERR,
      Self::Delivery(e) => e.exit_code(),
      Self::Config(_)
      | Self::MissingSection { .. }
      | Self::Lookup(_)
      | Self::Store(_) => EX_TEMPFAIL,
    }
  }
}
