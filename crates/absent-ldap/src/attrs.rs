//! Turning a directory entry's attributes into a [`Policy`].

use std::collections::HashMap;

use absent_core::{
  policy::{normalize_line_breaks, Window},
  Policy,
};
use chrono::{DateTime, Utc};

use crate::{lookup::LdapConfig, time::parse_generalized_time};

/// Attribute values keyed by name. LDAP attribute names are case-insensitive,
/// so lookups ignore case.
pub struct Attributes(HashMap<String, Vec<String>>);

impl Attributes {
  pub fn new(attrs: HashMap<String, Vec<String>>) -> Self { Self(attrs) }

  pub fn values(&self, name: &str) -> &[String] {
    self
      .0
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_slice())
      .unwrap_or(&[])
  }

  pub fn first(&self, name: &str) -> Option<&str> {
    self.values(name).first().map(String::as_str)
  }
}

/// Build the policy for `local_part` from its directory entry.
pub fn policy_from_entry(
  attrs: &Attributes,
  config: &LdapConfig,
  local_part: &str,
  is_group: bool,
  now: DateTime<Utc>,
) -> Policy {
  let flagged = attrs
    .first(&config.vacation_attr)
    .is_some_and(|v| v.trim().eq_ignore_ascii_case("TRUE"));

  // `$` is the line separator of directory multi-line strings.
  let message_values = attrs.values(&config.message_attr);
  let message_body = (!message_values.is_empty())
    .then(|| normalize_line_breaks(&message_values.join("\n").replace('$', "\n")))
    .filter(|body| !body.trim().is_empty());

  let display_name = attrs
    .first(&config.display_name_attr)
    .or_else(|| attrs.first("cn"))
    .map(str::trim)
    .filter(|name| !name.is_empty())
    .map(str::to_owned);

  let mut aliases = vec![local_part.to_owned()];
  aliases.extend(attrs.values("cn").iter().cloned());
  aliases.dedup();

  let start = window_bound(attrs, &config.start_attr, local_part);
  let end   = window_bound(attrs, &config.end_attr, local_part);

  let (window, well_formed) = match (start, end) {
    (Ok(start), Ok(end)) => (Window::new(start, end), true),
    _ => (Window::UNBOUNDED, false),
  };

  let active = flagged && well_formed && window.contains(now);
  tracing::debug!(
    local_part,
    flagged,
    is_group,
    in_window = window.contains(now),
    "resolved directory entry"
  );

  Policy {
    active,
    is_group,
    display_name,
    message_body,
    window,
    aliases,
  }
}

/// A missing bound is `Ok(None)`; a malformed one is `Err(())` and disables
/// the policy rather than silently widening the window.
fn window_bound(
  attrs: &Attributes,
  name: &str,
  local_part: &str,
) -> Result<Option<DateTime<Utc>>, ()> {
  match attrs.first(name) {
    None => Ok(None),
    Some(raw) => match parse_generalized_time(raw) {
      Some(t) => Ok(Some(t)),
      None => {
        tracing::warn!(local_part, attr = name, value = raw, "malformed autoreply bound");
        Err(())
      }
    },
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeDelta;

  use super::*;

  fn gt(t: DateTime<Utc>) -> String { t.format("%Y%m%d%H%M%SZ").to_string() }

  fn entry(pairs: &[(&str, &[&str])]) -> Attributes {
    Attributes::new(
      pairs
        .iter()
        .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
        .collect(),
    )
  }

  fn resolve(attrs: &Attributes) -> Policy {
    policy_from_entry(attrs, &LdapConfig::default(), "testrcpt", false, Utc::now())
  }

  #[test]
  fn flag_controls_activity() {
    assert!(resolve(&entry(&[("onVacation", &["TRUE"])])).active);
    assert!(resolve(&entry(&[("onvacation", &["true"])])).active);
    assert!(!resolve(&entry(&[("onVacation", &["FALSE"])])).active);
    assert!(!resolve(&entry(&[])).active);
  }

  #[test]
  fn dos_line_breaks_are_normalized() {
    let p = resolve(&entry(&[
      ("onVacation", &["TRUE"]),
      ("vacationMessage", &["Away until Monday.\r\n\r\nAsk the helpdesk.\r\n"]),
    ]));
    assert_eq!(p.message_body.as_deref(), Some("Away until Monday.\n\nAsk the helpdesk.\n"));
    assert_eq!(p.body_lines(), vec!["Away until Monday.", "", "Ask the helpdesk."]);
  }

  #[test]
  fn multi_valued_message_is_joined() {
    let p = resolve(&entry(&[
      ("onVacation", &["TRUE"]),
      ("vacationMessage", &["line one", "line two"]),
    ]));
    assert_eq!(p.body_lines(), vec!["line one", "line two"]);
  }

  #[test]
  fn dollar_separates_message_lines() {
    let p = resolve(&entry(&[
      ("onVacation", &["TRUE"]),
      ("vacationMessage", &["Away until Monday.$$Ask the helpdesk."]),
    ]));
    assert_eq!(p.body_lines(), vec!["Away until Monday.", "", "Ask the helpdesk."]);
  }

  #[test]
  fn display_name_falls_back_to_cn() {
    let p = resolve(&entry(&[("onVacation", &["TRUE"]), ("cn", &["Test Recipient", "T R"])]));
    assert_eq!(p.display_name.as_deref(), Some("Test Recipient"));
    assert_eq!(p.aliases, vec!["testrcpt", "Test Recipient", "T R"]);

    let p = resolve(&entry(&[
      ("onVacation", &["TRUE"]),
      ("displayName", &["Preferred Name"]),
      ("cn", &["Test Recipient"]),
    ]));
    assert_eq!(p.display_name.as_deref(), Some("Preferred Name"));
  }

  #[test]
  fn autoreply_windows() {
    let now = Utc::now();
    let day = TimeDelta::days(1);
    let past = gt(now - day);
    let future = gt(now + day);
    let far_future = gt(now + day * 2);

    let case = |pairs: &[(&str, &[&str])]| {
      let mut all = vec![("onVacation", &["TRUE"][..])];
      all.extend_from_slice(pairs);
      resolve(&entry(&all)).active
    };

    assert!(!case(&[("vacationEnd", &[past.as_str()])]));
    assert!(!case(&[("vacationStart", &[future.as_str()])]));
    assert!(!case(&[
      ("vacationStart", &[future.as_str()]),
      ("vacationEnd", &[far_future.as_str()]),
    ]));
    assert!(case(&[("vacationStart", &[past.as_str()])]));
    assert!(case(&[("vacationStart", &[past.as_str()]), ("vacationEnd", &[future.as_str()])]));
  }

  #[test]
  fn malformed_bound_disables_policy() {
    let p = resolve(&entry(&[("onVacation", &["TRUE"]), ("vacationEnd", &["next week"])]));
    assert!(!p.active);
  }
}
