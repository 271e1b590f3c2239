//! Suppression keys, records and claims.
//!
//! A key identifies one (recipient, sender) pair. The pair is ordered: a reply
//! from `a` to `b` says nothing about a reply from `b` to `a`. The sender half
//! is stored as a SHA-256 fingerprint so arbitrary sender addresses produce
//! bounded, printable keys.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use sha2::{Digest, Sha256};

use crate::Identity;

// ─── Key ─────────────────────────────────────────────────────────────────────

/// The address of a suppression record in a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SuppressionKey(String);

impl SuppressionKey {
  /// Derive the key for replies from `recipient` to `sender`.
  pub fn new(sender: &Identity, recipient: &Identity) -> Self {
    let digest = Sha256::digest(sender.address().as_bytes());
    // 64 bits of fingerprint is plenty for one recipient's correspondents.
    let fingerprint = hex::encode(&digest[..8]);
    Self(format!("user:{}:{}", recipient.address(), fingerprint))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for SuppressionKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// Bookkeeping for the last reply sent for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuppressionRecord {
  pub last_sent_at: DateTime<Utc>,
}

impl SuppressionRecord {
  /// The suppression window is `[last_sent_at, last_sent_at + interval)`.
  /// The instant the window closes already counts as expired.
  pub fn suppresses(&self, now: DateTime<Utc>, interval: TimeDelta) -> bool {
    now - self.last_sent_at < interval
  }
}

// ─── Claim ───────────────────────────────────────────────────────────────────

/// The outcome of an atomic check-and-set on a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
  /// A live record exists; no reply may be sent.
  Suppressed,
  /// The key now holds `claimed_at`. `previous` is the expired timestamp it
  /// replaced, kept so a failed delivery can put it back.
  Acquired {
    claimed_at: DateTime<Utc>,
    previous:   Option<DateTime<Utc>>,
  },
}

impl Claim {
  pub fn is_acquired(&self) -> bool { matches!(self, Self::Acquired { .. }) }
}

/// Truncate `t` to whole seconds, the resolution every store persists.
pub fn to_store_precision(t: DateTime<Utc>) -> DateTime<Utc> {
  DateTime::from_timestamp(t.timestamp(), 0).unwrap_or(t)
}
