//! [`LdapLookup`] — the directory implementation of [`PolicyLookup`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use serde::Deserialize;

use absent_core::{lookup::PolicyLookup, Identity, Policy};

use crate::{
  attrs::{policy_from_entry, Attributes},
  Error, Result,
};

/// `noSuchObject`: the search base itself does not exist.
const RC_NO_SUCH_OBJECT: u32 = 32;

// ─── Config ──────────────────────────────────────────────────────────────────

/// The `[ldap]` configuration section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LdapConfig {
  pub uri:               String,
  pub search_base:       String,
  pub group_search_base: Option<String>,
  pub bind_dn:           Option<String>,
  pub bind_password:     Option<String>,
  /// Seconds allowed for each of connect, bind and search.
  pub timeout:           u64,

  pub uid_attr:          String,
  pub group_attr:        String,
  pub vacation_attr:     String,
  pub message_attr:      String,
  pub display_name_attr: String,
  pub start_attr:        String,
  pub end_attr:          String,
}

impl Default for LdapConfig {
  fn default() -> Self {
    Self {
      uri:               "ldap://localhost".to_owned(),
      search_base:       String::new(),
      group_search_base: None,
      bind_dn:           None,
      bind_password:     None,
      timeout:           30,
      uid_attr:          "uid".to_owned(),
      group_attr:        "cn".to_owned(),
      vacation_attr:     "onVacation".to_owned(),
      message_attr:      "vacationMessage".to_owned(),
      display_name_attr: "displayName".to_owned(),
      start_attr:        "vacationStart".to_owned(),
      end_attr:          "vacationEnd".to_owned(),
    }
  }
}

impl LdapConfig {
  fn timeout(&self) -> Duration { Duration::from_secs(self.timeout) }

  fn attributes(&self) -> Vec<&str> {
    vec![
      "cn",
      self.vacation_attr.as_str(),
      self.message_attr.as_str(),
      self.display_name_attr.as_str(),
      self.start_attr.as_str(),
      self.end_attr.as_str(),
    ]
  }
}

// ─── Lookup ──────────────────────────────────────────────────────────────────

/// Resolves vacation policy from an LDAP directory.
#[derive(Debug, Clone)]
pub struct LdapLookup {
  config: LdapConfig,
}

/// What a single search base yielded for a recipient.
enum Found {
  Nothing,
  One(Attributes),
  Ambiguous(usize),
}

impl LdapLookup {
  pub fn new(config: LdapConfig) -> Self { Self { config } }

  async fn connect(&self) -> Result<Ldap> {
    let timeout = self.config.timeout();
    let settings = LdapConnSettings::new().set_conn_timeout(timeout);

    tracing::debug!(uri = %self.config.uri, "connecting to directory");
    let (conn, mut ldap) = tokio::time::timeout(
      timeout,
      LdapConnAsync::with_settings(settings, &self.config.uri),
    )
    .await
    .map_err(|_| Error::Timeout(timeout))??;

    tokio::spawn(async move {
      if let Err(e) = conn.drive().await {
        tracing::warn!(error = %e, "directory connection closed with error");
      }
    });

    let bind_dn = self.config.bind_dn.as_deref().filter(|dn| !dn.is_empty());
    if let Some(bind_dn) = bind_dn {
      let password = self.config.bind_password.as_deref().unwrap_or_default();
      tracing::debug!(bind_dn, "binding to directory");
      ldap
        .with_timeout(timeout)
        .simple_bind(bind_dn, password)
        .await?
        .success()?;
    }

    Ok(ldap)
  }

  async fn search(&self, ldap: &mut Ldap, base: &str, attr: &str, value: &str) -> Result<Found> {
    let filter = format!("({attr}={})", ldap3::ldap_escape(value));
    tracing::debug!(base, %filter, "searching directory");

    let result = ldap
      .with_timeout(self.config.timeout())
      .search(base, Scope::Subtree, &filter, self.config.attributes())
      .await?;

    if result.1.rc == RC_NO_SUCH_OBJECT {
      tracing::debug!(base, "search base does not exist");
      return Ok(Found::Nothing);
    }
    let (mut entries, _) = result.success()?;

    match entries.len() {
      0 => Ok(Found::Nothing),
      1 => {
        let entry = SearchEntry::construct(entries.remove(0));
        Ok(Found::One(Attributes::new(entry.attrs)))
      }
      n => Ok(Found::Ambiguous(n)),
    }
  }

  async fn lookup(&self, ldap: &mut Ldap, local_part: &str, now: DateTime<Utc>) -> Result<Policy> {
    let config = &self.config;

    let mut found = self
      .search(ldap, &config.search_base, &config.uid_attr, local_part)
      .await?;
    let mut is_group = false;

    let group_base = config.group_search_base.as_deref();
    if let (true, Some(group_base)) = (matches!(found, Found::Nothing), group_base) {
      found = self
        .search(ldap, group_base, &config.group_attr, local_part)
        .await?;
      is_group = true;
    }

    match found {
      Found::Nothing => {
        tracing::debug!(local_part, "recipient not in directory");
        Ok(Policy::inactive())
      }
      Found::Ambiguous(n) => {
        tracing::warn!(local_part, matches = n, "ambiguous recipient; not replying");
        Ok(Policy::inactive())
      }
      Found::One(attrs) => Ok(policy_from_entry(&attrs, config, local_part, is_group, now)),
    }
  }
}

// ─── PolicyLookup impl ───────────────────────────────────────────────────────

impl PolicyLookup for LdapLookup {
  type Error = Error;

  async fn resolve(&self, recipient: &Identity, now: DateTime<Utc>) -> Result<Policy> {
    let mut ldap = self.connect().await?;
    let policy = self.lookup(&mut ldap, recipient.local_part(), now).await;

    if let Err(e) = ldap.unbind().await {
      tracing::debug!(error = %e, "unbind failed");
    }
    policy
  }
}
