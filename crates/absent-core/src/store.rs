//! The `SuppressionStore` trait and the no-persistence backend.
//!
//! The trait is implemented by storage backends (`absent-store-sqlite`,
//! `absent-store-redis`). The decision engine depends on this abstraction, not
//! on any concrete backend.

use std::{convert::Infallible, future::Future};

use chrono::{DateTime, TimeDelta, Utc};

use crate::suppression::{Claim, SuppressionKey};

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Durable last-reply bookkeeping, shared by every concurrent invocation.
///
/// `claim` and `release` must be atomic per key across independent
/// processes: of two invocations racing on an expired key, exactly one may
/// observe [`Claim::Acquired`]. A plain read followed by a plain write does
/// not satisfy this.
///
/// All methods return `Send` futures so the trait can be used from a
/// multi-threaded tokio runtime.
pub trait SuppressionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// True if a record for `key` exists and `now - last_sent_at < interval`.
  fn should_suppress<'a>(
    &'a self,
    key: &'a SuppressionKey,
    now: DateTime<Utc>,
    interval: TimeDelta,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Atomically take the key: if it has no live record, store `now` and
  /// return [`Claim::Acquired`]; otherwise return [`Claim::Suppressed`].
  fn claim<'a>(
    &'a self,
    key: &'a SuppressionKey,
    now: DateTime<Utc>,
    interval: TimeDelta,
  ) -> impl Future<Output = Result<Claim, Self::Error>> + Send + 'a;

  /// Undo a claim whose reply could not be delivered.
  ///
  /// Only takes effect while the record still holds `claimed_at`; a newer
  /// write from another invocation is left alone.
  fn release<'a>(
    &'a self,
    key: &'a SuppressionKey,
    claimed_at: DateTime<Utc>,
    previous: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Create or overwrite the record for `key` with `last_sent_at = now`.
  /// Last write wins, so retrying is harmless.
  fn record_sent<'a>(
    &'a self,
    key: &'a SuppressionKey,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── Null backend ────────────────────────────────────────────────────────────

/// A store that remembers nothing.
///
/// Every request is treated as never suppressed, so this backend cannot
/// deduplicate replies. Do not configure it where repeated replies within
/// the interval are unacceptable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

impl SuppressionStore for NullStore {
  type Error = Infallible;

  async fn should_suppress(
    &self,
    _key: &SuppressionKey,
    _now: DateTime<Utc>,
    _interval: TimeDelta,
  ) -> Result<bool, Infallible> {
    Ok(false)
  }

  async fn claim(
    &self,
    _key: &SuppressionKey,
    now: DateTime<Utc>,
    _interval: TimeDelta,
  ) -> Result<Claim, Infallible> {
    Ok(Claim::Acquired { claimed_at: now, previous: None })
  }

  async fn release(
    &self,
    _key: &SuppressionKey,
    _claimed_at: DateTime<Utc>,
    _previous: Option<DateTime<Utc>>,
  ) -> Result<(), Infallible> {
    Ok(())
  }

  async fn record_sent(
    &self,
    _key: &SuppressionKey,
    _now: DateTime<Utc>,
  ) -> Result<(), Infallible> {
    Ok(())
  }
}
