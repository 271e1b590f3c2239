//! Identity — a normalized sender or recipient address.
//!
//! Addresses are compared case-insensitively: both parts are lowercased on
//! construction, so `User@Example.com` and `user@example.com` are the same
//! identity and map to the same suppression key.

use std::fmt;

use crate::{Error, Result};

/// A mail address split into local part and (optional) domain.
///
/// Recipients are usually handed to us as a bare local part; they gain a
/// domain through [`Identity::with_default_domain`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
  local:  String,
  domain: Option<String>,
}

impl Identity {
  /// Parse `input` as either `local@domain` or a bare `local`.
  ///
  /// Surrounding whitespace and a single pair of angle brackets are removed.
  /// The split happens on the last `@`, so quoted local parts containing `@`
  /// survive.
  pub fn parse(input: &str) -> Result<Self> {
    let trimmed = input.trim();
    let trimmed = trimmed
      .strip_prefix('<')
      .and_then(|s| s.strip_suffix('>'))
      .unwrap_or(trimmed)
      .trim();

    if trimmed.is_empty() {
      return Err(Error::EmptyAddress);
    }
    if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
      return Err(Error::InvalidAddress(input.to_owned()));
    }

    match trimmed.rsplit_once('@') {
      Some((local, domain)) => {
        if local.is_empty() || domain.is_empty() {
          return Err(Error::InvalidAddress(input.to_owned()));
        }
        Ok(Self {
          local:  local.to_ascii_lowercase(),
          domain: Some(domain.to_ascii_lowercase()),
        })
      }
      None => Ok(Self { local: trimmed.to_ascii_lowercase(), domain: None }),
    }
  }

  pub fn local_part(&self) -> &str { &self.local }

  pub fn domain(&self) -> Option<&str> { self.domain.as_deref() }

  /// Return a copy qualified with `domain` if this identity has none.
  pub fn with_default_domain(&self, domain: &str) -> Self {
    match self.domain {
      Some(_) => self.clone(),
      None => Self {
        local:  self.local.clone(),
        domain: Some(domain.to_ascii_lowercase()),
      },
    }
  }

  /// The full address, `local@domain`, or just the local part.
  pub fn address(&self) -> String { self.to_string() }
}

impl fmt::Display for Identity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.domain {
      Some(domain) => write!(f, "{}@{}", self.local, domain),
      None => f.write_str(&self.local),
    }
  }
}
