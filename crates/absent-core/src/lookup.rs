//! The `PolicyLookup` trait and the always-on-vacation backend.

use std::{convert::Infallible, future::Future};

use chrono::{DateTime, Utc};

use crate::{Identity, Policy};

/// Resolves a recipient to its vacation [`Policy`].
///
/// A recipient the directory does not know yields an inactive policy. Only
/// failures to consult the directory at all (unreachable, timeout, refused
/// credentials) are errors.
pub trait PolicyLookup: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn resolve<'a>(
    &'a self,
    recipient: &'a Identity,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Policy, Self::Error>> + Send + 'a;
}

/// Treats every recipient as permanently on vacation with the default
/// message and no display name.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLookup;

impl PolicyLookup for NullLookup {
  type Error = Infallible;

  async fn resolve(
    &self,
    recipient: &Identity,
    _now: DateTime<Utc>,
  ) -> Result<Policy, Infallible> {
    Ok(Policy {
      active: true,
      aliases: vec![recipient.local_part().to_owned()],
      ..Policy::default()
    })
  }
}
