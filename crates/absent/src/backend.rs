//! Backend selection: the configured lookup and store, behind closed enums.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;

use absent_core::{
  lookup::{NullLookup, PolicyLookup},
  store::{NullStore, SuppressionStore},
  Claim, Identity, Policy, SuppressionKey,
};
use absent_ldap::LdapLookup;
use absent_store_redis::RedisStore;
use absent_store_sqlite::SqliteStore;

use tokio::sync::OnceCell;

use crate::{
  config::{Config, RedisConfig, SqliteConfig, VdbKind, VluKind},
  Result,
};

#[derive(Debug, Error)]
pub enum LookupError {
  #[error(transparent)]
  Ldap(#[from] absent_ldap::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error(transparent)]
  Sqlite(#[from] absent_store_sqlite::Error),

  #[error(transparent)]
  Redis(#[from] absent_store_redis::Error),
}

// ─── Lookup ──────────────────────────────────────────────────────────────────

/// The configured vacation lookup unit.
#[derive(Debug, Clone)]
pub enum Vlu {
  Null(NullLookup),
  Ldap(LdapLookup),
}

impl Vlu {
  pub fn from_config(config: &Config) -> Result<Self> {
    match config.core.vlu {
      VluKind::Null => Ok(Self::Null(NullLookup)),
      VluKind::Ldap => Ok(Self::Ldap(LdapLookup::new(config.ldap()?.clone()))),
    }
  }
}

impl PolicyLookup for Vlu {
  type Error = LookupError;

  async fn resolve(&self, recipient: &Identity, now: DateTime<Utc>) -> Result<Policy, LookupError> {
    match self {
      Self::Null(lookup) => match lookup.resolve(recipient, now).await {
        Ok(policy) => Ok(policy),
        Err(never) => match never {},
      },
      Self::Ldap(lookup) => Ok(lookup.resolve(recipient, now).await?),
    }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// The configured vacation database.
///
/// [`Vdb::Null`] keeps nothing, so it cannot stop repeat replies: every
/// invocation answers.
#[derive(Clone)]
pub enum Vdb {
  Null(NullStore),
  Sqlite(SqliteStore),
  Redis(RedisStore),
}

impl Vdb {
  async fn connect(target: &VdbTarget, interval: TimeDelta) -> Result<Self, StoreError> {
    match target {
      VdbTarget::Null => Ok(Self::Null(NullStore)),
      VdbTarget::Sqlite(sqlite) => {
        let store =
          SqliteStore::open(&sqlite.path, Duration::from_secs(sqlite.busy_timeout)).await?;
        Ok(Self::Sqlite(store))
      }
      VdbTarget::Redis(redis) => {
        let store = RedisStore::connect(
          &redis.host,
          redis.port,
          redis.db,
          Duration::from_secs(redis.timeout),
        )
        .await?
        .with_prefix(redis.prefix.clone())
        .with_expiry(interval.to_std().ok());
        Ok(Self::Redis(store))
      }
    }
  }
}

#[derive(Debug, Clone)]
enum VdbTarget {
  Null,
  Sqlite(SqliteConfig),
  Redis(RedisConfig),
}

/// The configured vacation database, connected on first use.
///
/// A recipient who is not on vacation, a failed lookup and a screened-out
/// message all finish without opening the store, so none of them creates
/// files or needs the store server to be up.
pub struct LazyVdb {
  target:   VdbTarget,
  interval: TimeDelta,
  vdb:      OnceCell<Vdb>,
}

impl LazyVdb {
  /// Check that the selected backend has its section. Nothing is opened yet;
  /// Redis keys will expire after `interval`.
  pub fn from_config(config: &Config, interval: TimeDelta) -> Result<Self> {
    let target = match config.core.vdb {
      VdbKind::Null => VdbTarget::Null,
      VdbKind::Sqlite => VdbTarget::Sqlite(config.sqlite()?.clone()),
      VdbKind::Redis => VdbTarget::Redis(config.redis()?.clone()),
    };
    Ok(Self { target, interval, vdb: OnceCell::new() })
  }

  /// The store, if something has needed it yet.
  pub fn opened(&self) -> Option<&Vdb> { self.vdb.get() }

  async fn get(&self) -> Result<&Vdb, StoreError> {
    self
      .vdb
      .get_or_try_init(|| async {
        tracing::debug!(backend = ?self.target, "opening suppression store");
        Vdb::connect(&self.target, self.interval).await
      })
      .await
  }
}

impl SuppressionStore for LazyVdb {
  type Error = StoreError;

  async fn should_suppress(
    &self,
    key: &SuppressionKey,
    now: DateTime<Utc>,
    interval: TimeDelta,
  ) -> Result<bool, StoreError> {
    self.get().await?.should_suppress(key, now, interval).await
  }

  async fn claim(
    &self,
    key: &SuppressionKey,
    now: DateTime<Utc>,
    interval: TimeDelta,
  ) -> Result<Claim, StoreError> {
    self.get().await?.claim(key, now, interval).await
  }

  async fn release(
    &self,
    key: &SuppressionKey,
    claimed_at: DateTime<Utc>,
    previous: Option<DateTime<Utc>>,
  ) -> Result<(), StoreError> {
    self.get().await?.release(key, claimed_at, previous).await
  }

  async fn record_sent(&self, key: &SuppressionKey, now: DateTime<Utc>) -> Result<(), StoreError> {
    self.get().await?.record_sent(key, now).await
  }
}

impl SuppressionStore for Vdb {
  type Error = StoreError;

  async fn should_suppress(
    &self,
    key: &SuppressionKey,
    now: DateTime<Utc>,
    interval: TimeDelta,
  ) -> Result<bool, StoreError> {
    match self {
      Self::Null(_) => Ok(false),
      Self::Sqlite(store) => Ok(store.should_suppress(key, now, interval).await?),
      Self::Redis(store) => Ok(store.should_suppress(key, now, interval).await?),
    }
  }

  async fn claim(
    &self,
    key: &SuppressionKey,
    now: DateTime<Utc>,
    interval: TimeDelta,
  ) -> Result<Claim, StoreError> {
    match self {
      Self::Null(store) => match store.claim(key, now, interval).await {
        Ok(claim) => Ok(claim),
        Err(never) => match never {},
      },
      Self::Sqlite(store) => Ok(store.claim(key, now, interval).await?),
      Self::Redis(store) => Ok(store.claim(key, now, interval).await?),
    }
  }

  async fn release(
    &self,
    key: &SuppressionKey,
    claimed_at: DateTime<Utc>,
    previous: Option<DateTime<Utc>>,
  ) -> Result<(), StoreError> {
    match self {
      Self::Null(_) => Ok(()),
      Self::Sqlite(store) => Ok(store.release(key, claimed_at, previous).await?),
      Self::Redis(store) => Ok(store.release(key, claimed_at, previous).await?),
    }
  }

  async fn record_sent(&self, key: &SuppressionKey, now: DateTime<Utc>) -> Result<(), StoreError> {
    match self {
      Self::Null(_) => Ok(()),
      Self::Sqlite(store) => Ok(store.record_sent(key, now).await?),
      Self::Redis(store) => Ok(store.record_sent(key, now).await?),
    }
  }
}
