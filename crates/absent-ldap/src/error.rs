//! Error type for `absent-ldap`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("ldap error: {0}")]
  Ldap(#[from] ldap3::LdapError),

  #[error("ldap lookup timed out after {0:?}")]
  Timeout(std::time::Duration),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
