//! Configuration loading.
//!
//! The file format follows the extension (`.json`, `.yaml`/`.yml`, `.ini`,
//! anything else is TOML). Environment variables prefixed `ABSENT_` override
//! file values, with `__` between section and key: `ABSENT_CORE__INTERVAL=60`.

use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use config::{Environment, File, FileFormat};
use serde::Deserialize;

pub use absent_ldap::LdapConfig;

use crate::{Error, Result};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/mail/absent.toml";
pub const DEFAULT_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;
pub const DEFAULT_SENDMAIL: &str = "/usr/sbin/sendmail -f '' -- $R";

// ─── Backend selectors ───────────────────────────────────────────────────────

/// Which suppression store to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VdbKind {
  /// No persistence; every message is answered.
  #[default]
  Null,
  Sqlite,
  Redis,
}

/// Which policy directory to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VluKind {
  /// Every recipient is on vacation.
  #[default]
  Null,
  Ldap,
}

// ─── Sections ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
  pub vdb:      VdbKind,
  pub vlu:      VluKind,
  /// Minimum seconds between two replies to the same sender.
  pub interval: u64,
  /// Delivery command; `$R` is the reply recipient, `$S` the envelope sender.
  pub sendmail: String,
  /// Domain for recipients given as a bare local part.
  pub domain:   String,
}

impl Default for CoreConfig {
  fn default() -> Self {
    Self {
      vdb:      VdbKind::Null,
      vlu:      VluKind::Null,
      interval: DEFAULT_INTERVAL_SECS,
      sendmail: DEFAULT_SENDMAIL.to_owned(),
      domain:   "localhost".to_owned(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
  /// Database file, or a directory to hold `vacation.db`.
  pub path:         PathBuf,
  /// Seconds to wait on another process's write lock.
  pub busy_timeout: u64,
}

impl Default for SqliteConfig {
  fn default() -> Self {
    Self {
      path:         PathBuf::from("/var/lib/absent/vacation.db"),
      busy_timeout: 30,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
  pub host:    String,
  pub port:    u16,
  pub db:      i64,
  pub prefix:  String,
  /// Seconds allowed for connecting and for each command.
  pub timeout: u64,
}

impl Default for RedisConfig {
  fn default() -> Self {
    Self {
      host:    "127.0.0.1".to_owned(),
      port:    absent_store_redis::DEFAULT_PORT,
      db:      0,
      prefix:  absent_store_redis::DEFAULT_PREFIX.to_owned(),
      timeout: 10,
    }
  }
}

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub core:   CoreConfig,
  pub sqlite: Option<SqliteConfig>,
  pub redis:  Option<RedisConfig>,
  pub ldap:   Option<LdapConfig>,
}

impl Config {
  /// Read the configuration file at `path`, then apply `ABSENT_*` overrides.
  /// A missing file is an error.
  pub fn load(path: &Path) -> Result<Self> {
    tracing::debug!(path = %path.display(), "loading configuration");
    let settings = config::Config::builder()
      .add_source(File::from(path).format(format_for(path)).required(true))
      .add_source(
        Environment::with_prefix("ABSENT")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()?;
    Ok(settings.try_deserialize()?)
  }

  pub fn interval(&self) -> TimeDelta { interval_from_secs(self.core.interval) }

  pub fn sqlite(&self) -> Result<&SqliteConfig> {
    self.sqlite.as_ref().ok_or(Error::MissingSection { backend: "sqlite", section: "sqlite" })
  }

  pub fn redis(&self) -> Result<&RedisConfig> {
    self.redis.as_ref().ok_or(Error::MissingSection { backend: "redis", section: "redis" })
  }

  pub fn ldap(&self) -> Result<&LdapConfig> {
    self.ldap.as_ref().ok_or(Error::MissingSection { backend: "ldap", section: "ldap" })
  }
}

/// Convert a configured number of seconds, saturating instead of overflowing.
pub fn interval_from_secs(secs: u64) -> TimeDelta {
  i64::try_from(secs)
    .ok()
    .and_then(TimeDelta::try_seconds)
    .unwrap_or(TimeDelta::MAX)
}

fn format_for(path: &Path) -> FileFormat {
  let ext = path
    .extension()
    .and_then(|e| e.to_str())
    .map(str::to_ascii_lowercase);
  match ext.as_deref() {
    Some("json") => FileFormat::Json,
    Some("yaml" | "yml") => FileFormat::Yaml,
    Some("ini") => FileFormat::Ini,
    _ => FileFormat::Toml,
  }
}
