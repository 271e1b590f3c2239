//! [`SqliteStore`] — the SQLite implementation of [`SuppressionStore`].

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};

use absent_core::{
  store::SuppressionStore,
  suppression::{to_store_precision, Claim, SuppressionKey, SuppressionRecord},
};

use crate::{
  encode::{decode_dt, encode_dt},
  schema::SCHEMA,
  Error, Result,
};

/// File name used when the configured path is a directory.
pub const DEFAULT_FILE_NAME: &str = "vacation.db";

/// How long a writer waits on another process's transaction by default.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

// ─── Store ───────────────────────────────────────────────────────────────────

/// A suppression store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. The file
/// handle is closed when the last clone is dropped.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  ///
  /// If `path` is an existing directory the database lives at
  /// `path/vacation.db`. Missing parent directories are created.
  pub async fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
    let path = resolve_path(path.as_ref()).await;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(parent)
        .await
        .map_err(|source| Error::Directory { path: parent.to_path_buf(), source })?;
    }

    tracing::debug!(path = %path.display(), "opening sqlite suppression store");
    let conn = tokio_rusqlite::Connection::open(&path).await?;
    let store = Self { conn };
    store.init(busy_timeout).await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init(DEFAULT_BUSY_TIMEOUT).await?;
    Ok(store)
  }

  async fn init(&self, busy_timeout: Duration) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Read the raw record for `key`, if any.
  pub async fn get(&self, key: &SuppressionKey) -> Result<Option<SuppressionRecord>> {
    let key_str = key.as_str().to_owned();

    let raw: Option<i64> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT last_sent_at FROM suppressions WHERE key = ?1",
              rusqlite::params![key_str],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|secs| decode_dt(secs).map(|last_sent_at| SuppressionRecord { last_sent_at }))
      .transpose()
  }
}

async fn resolve_path(path: &Path) -> PathBuf {
  match tokio::fs::metadata(path).await {
    Ok(meta) if meta.is_dir() => path.join(DEFAULT_FILE_NAME),
    _ => path.to_path_buf(),
  }
}

// ─── SuppressionStore impl ───────────────────────────────────────────────────

impl SuppressionStore for SqliteStore {
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
    let key_str      = key.as_str().to_owned();
    let claimed_at   = to_store_precision(now);
    let now_secs     = encode_dt(claimed_at);
    let interval_secs = interval.num_seconds();

    // `Ok(None)` means a live record blocked the claim; `Ok(Some(prev))`
    // means we wrote `now_secs`, replacing `prev`.
    let outcome: Option<Option<i64>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let last: Option<i64> = tx
          .query_row(
            "SELECT last_sent_at FROM suppressions WHERE key = ?1",
            rusqlite::params![key_str],
            |row| row.get(0),
          )
          .optional()?;

        if last.is_some_and(|last| now_secs - last < interval_secs) {
          return Ok(None);
        }

        tx.execute(
          "INSERT INTO suppressions (key, last_sent_at) VALUES (?1, ?2)
           ON CONFLICT (key) DO UPDATE SET last_sent_at = excluded.last_sent_at",
          rusqlite::params![key_str, now_secs],
        )?;
        tx.commit()?;

        Ok(Some(last))
      })
      .await?;

    match outcome {
      None => Ok(Claim::Suppressed),
      Some(previous) => Ok(Claim::Acquired {
        claimed_at,
        previous: previous.map(decode_dt).transpose()?,
      }),
    }
  }

  async fn release(
    &self,
    key:        &SuppressionKey,
    claimed_at: DateTime<Utc>,
    previous:   Option<DateTime<Utc>>,
  ) -> Result<()> {
    let key_str      = key.as_str().to_owned();
    let claimed_secs = encode_dt(claimed_at);
    let previous_secs = previous.map(encode_dt);

    let changed = self
      .conn
      .call(move |conn| {
        let n = match previous_secs {
          Some(prev) => conn.execute(
            "UPDATE suppressions SET last_sent_at = ?3
             WHERE key = ?1 AND last_sent_at = ?2",
            rusqlite::params![key_str, claimed_secs, prev],
          )?,
          None => conn.execute(
            "DELETE FROM suppressions WHERE key = ?1 AND last_sent_at = ?2",
            rusqlite::params![key_str, claimed_secs],
          )?,
        };
        Ok(n)
      })
      .await?;

    if changed == 0 {
      tracing::debug!(%key, "claim already superseded; nothing to release");
    }
    Ok(())
  }

  async fn record_sent(&self, key: &SuppressionKey, now: DateTime<Utc>) -> Result<()> {
    let key_str  = key.as_str().to_owned();
    let now_secs = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO suppressions (key, last_sent_at) VALUES (?1, ?2)
           ON CONFLICT (key) DO UPDATE SET last_sent_at = excluded.last_sent_at",
          rusqlite::params![key_str, now_secs],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
