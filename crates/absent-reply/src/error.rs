//! Error type for `absent-reply`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("malformed message header: {0}")]
  Parse(#[from] mailparse::MailParseError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
