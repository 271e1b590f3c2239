//! Error types for `absent-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("empty address")]
  EmptyAddress,

  #[error("invalid address: {0:?}")]
  InvalidAddress(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
