//! [`RedisStore`] — the Redis implementation of [`SuppressionStore`].

use std::{future::Future, sync::LazyLock, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use redis::{aio::MultiplexedConnection, Script};

use absent_core::{
  store::SuppressionStore,
  suppression::{to_store_precision, Claim, SuppressionKey, SuppressionRecord},
};

use crate::{Error, Result};

pub const DEFAULT_PORT: u16 = 6379;

/// Namespace prepended to every key.
pub const DEFAULT_PREFIX: &str = "absent";

static CLAIM_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(include_str!("claim.lua")));
static RELEASE_SCRIPT: LazyLock<Script> =
  LazyLock::new(|| Script::new(include_str!("release.lua")));

// ─── Store ───────────────────────────────────────────────────────────────────

/// A suppression store kept in Redis.
///
/// Cloning is cheap — the multiplexed connection is shared. It is closed when
/// the last clone is dropped.
#[derive(Clone)]
pub struct RedisStore {
  conn:    MultiplexedConnection,
  prefix:  String,
  timeout: Duration,
  /// Expiry applied to every write; `None` keeps keys forever.
  expiry:  Option<Duration>,
}

impl RedisStore {
  /// Connect to `host:port`, selecting database `db`.
  pub async fn connect(host: &str, port: u16, db: i64, timeout: Duration) -> Result<Self> {
    Self::open(&format!("redis://{host}:{port}/{db}"), timeout).await
  }

  /// Connect using a `redis://` URL.
  pub async fn open(url: &str, timeout: Duration) -> Result<Self> {
    tracing::debug!(url, "connecting to redis suppression store");
    let client = redis::Client::open(url)?;
    let conn = tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
      .await
      .map_err(|_| Error::Timeout(timeout))??;

    Ok(Self {
      conn,
      prefix: DEFAULT_PREFIX.to_owned(),
      timeout,
      expiry: None,
    })
  }

  /// Namespace keys under `prefix` instead of [`DEFAULT_PREFIX`].
  pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
    self.prefix = prefix.into();
    self
  }

  /// Expire written keys after `expiry` (rounded up to at least a second).
  pub fn with_expiry(mut self, expiry: Option<Duration>) -> Self {
    self.expiry = expiry;
    self
  }

  fn redis_key(&self, key: &SuppressionKey) -> String {
    if self.prefix.is_empty() {
      key.as_str().to_owned()
    } else {
      format!("{}:{}", self.prefix, key)
    }
  }

  fn expiry_secs(&self) -> u64 {
    self.expiry.map(|d| d.as_secs().max(1)).unwrap_or(0)
  }

  async fn timed<T, F>(&self, fut: F) -> Result<T>
  where
    F: Future<Output = redis::RedisResult<T>>,
  {
    tokio::time::timeout(self.timeout, fut)
      .await
      .map_err(|_| Error::Timeout(self.timeout))?
      .map_err(Error::from)
  }

  /// Read the raw record for `key`, if any.
  pub async fn get(&self, key: &SuppressionKey) -> Result<Option<SuppressionRecord>> {
    let mut conn = self.conn.clone();
    let redis_key = self.redis_key(key);

    let raw: Option<i64> = self
      .timed(redis::cmd("GET").arg(&redis_key).query_async(&mut conn))
      .await?;

    raw
      .map(|secs| decode_dt(secs).map(|last_sent_at| SuppressionRecord { last_sent_at }))
      .transpose()
  }
}

fn decode_dt(secs: i64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp(secs, 0).ok_or(Error::Timestamp(secs))
}

// ─── SuppressionStore impl ───────────────────────────────────────────────────

impl SuppressionStore for RedisStore {
  type Error = Error;

  async fn should_suppress(
    &self,
    key:      &SuppressionKey,
    now:      DateTime<Utc>,
    interval: TimeDelta,
  ) -> Result<bool> {
    let suppressed = self
      .get(key)
      .await?
      .is_some_and(|record| record.suppresses(to_store_precision(now), interval));
    Ok(suppressed)
  }

  async fn claim(
    &self,
    key:      &SuppressionKey,
    now:      DateTime<Utc>,
    interval: TimeDelta,
  ) -> Result<Claim> {
    let mut conn   = self.conn.clone();
    let claimed_at = to_store_precision(now);

    let mut invocation = CLAIM_SCRIPT.prepare_invoke();
    invocation
      .key(self.redis_key(key))
      .arg(claimed_at.timestamp())
      .arg(interval.num_seconds())
      .arg(self.expiry_secs());

    let reply: Vec<i64> = self.timed(invocation.invoke_async(&mut conn)).await?;

    match reply.as_slice() {
      [0] => Ok(Claim::Suppressed),
      [1] => Ok(Claim::Acquired { claimed_at, previous: None }),
      [1, previous] => Ok(Claim::Acquired {
        claimed_at,
        previous: Some(decode_dt(*previous)?),
      }),
      _ => Err(Error::UnexpectedReply(reply)),
    }
  }

  async fn release(
    &self,
    key:        &SuppressionKey,
    claimed_at: DateTime<Utc>,
    previous:   Option<DateTime<Utc>>,
  ) -> Result<()> {
    let mut conn = self.conn.clone();

    let mut invocation = RELEASE_SCRIPT.prepare_invoke();
    invocation
      .key(self.redis_key(key))
      .arg(claimed_at.timestamp())
      .arg(previous.map(|p| p.timestamp().to_string()).unwrap_or_default())
      .arg(self.expiry_secs());

    let released: i64 = self.timed(invocation.invoke_async(&mut conn)).await?;
    if released == 0 {
      tracing::debug!(%key, "claim already superseded; nothing to release");
    }
    Ok(())
  }

  async fn record_sent(&self, key: &SuppressionKey, now: DateTime<Utc>) -> Result<()> {
    let mut conn = self.conn.clone();

    let mut cmd = redis::cmd("SET");
    cmd.arg(self.redis_key(key)).arg(now.timestamp());
    let expiry = self.expiry_secs();
    if expiry > 0 {
      cmd.arg("EX").arg(expiry);
    }

    let () = self.timed(cmd.query_async(&mut conn)).await?;
    Ok(())
  }
}
