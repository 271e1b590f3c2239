//! Error type for `absent-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("cannot prepare database directory {path}: {source}")]
  Directory {
    path:   std::path::PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("stored timestamp out of range: {0}")]
  Timestamp(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
