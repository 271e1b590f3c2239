//! Error type for `absent-store-redis`.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("redis error: {0}")]
  Redis(#[from] redis::RedisError),

  #[error("redis operation timed out after {0:?}")]
  Timeout(Duration),

  #[error("unexpected reply from claim script: {0:?}")]
  UnexpectedReply(Vec<i64>),

  #[error("stored timestamp out of range: {0}")]
  Timestamp(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
