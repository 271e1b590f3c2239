//! Inbound message headers and the RFC 3834 §2 screening rules.

use std::fmt;

use absent_core::Identity;
use mailparse::MailHeaderMap as _;

use crate::{compose::Original, Result};

/// Local parts that belong to software rather than people.
const RESTRICTED_LOCAL_PARTS: &[&str] = &["postmaster", "uucp", "mailer", "mailer-daemon"];
const RESTRICTED_SUFFIXES: &[&str] = &["-request", "-relay"];

const BULK_PRECEDENCE: &[&str] = &["junk", "bulk", "list"];

/// The header facts of an inbound message that decide whether it is answered.
#[derive(Debug, Clone, Default)]
pub struct InboundMessage {
  pub original:      Original,
  /// Sender from a leading mbox `From ` line.
  pub mbox_sender:   Option<String>,
  pub return_path:   Option<String>,
  auto_submitted:    Option<String>,
  list_header:       Option<String>,
  precedence:        Option<String>,
  response_suppress: Option<String>,
  /// Raw `To` and `Cc` values.
  recipients:        Vec<String>,
}

/// Why a message was not answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
  AutoSubmitted(String),
  MailingList(String),
  Precedence(String),
  ResponseSuppressed(String),
  UnknownSender,
  InvalidSender(String),
  NotAddressed,
  RestrictedSender(String),
}

impl fmt::Display for SkipReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::AutoSubmitted(v) => write!(f, "Auto-Submitted: {v}"),
      Self::MailingList(name) => write!(f, "mailing list header {name}"),
      Self::Precedence(v) => write!(f, "Precedence: {v}"),
      Self::ResponseSuppressed(v) => write!(f, "X-Auto-Response-Suppress: {v}"),
      Self::UnknownSender => f.write_str("unknown sender"),
      Self::InvalidSender(s) => write!(f, "unparseable sender {s:?}"),
      Self::NotAddressed => f.write_str("recipient not named in To or Cc"),
      Self::RestrictedSender(s) => write!(f, "restricted sender {s}"),
    }
  }
}

/// The result of screening a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screening {
  /// Answer the message; the reply goes to this (canonical) sender.
  Reply(Identity),
  Skip(SkipReason),
}

impl InboundMessage {
  /// Parse the header block of `raw`. The body, if present, is ignored.
  pub fn parse(raw: &[u8]) -> Result<Self> {
    let (mbox_sender, rest) = split_mbox_line(raw);
    let (headers, _) = mailparse::parse_headers(rest)?;

    let first = |name: &str| {
      headers
        .get_first_value(name)
        .map(|v| v.trim().to_owned())
    };

    let list_header = headers
      .iter()
      .map(|h| h.get_key())
      .find(|key| key.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("list-")));

    let mut recipients = headers.get_all_values("To");
    recipients.extend(headers.get_all_values("Cc"));

    Ok(Self {
      original: Original {
        subject:     first("Subject").unwrap_or_default(),
        message_id:  first("Message-ID"),
        in_reply_to: first("In-Reply-To"),
        references:  first("References"),
      },
      mbox_sender,
      return_path: first("Return-Path"),
      auto_submitted: first("Auto-Submitted"),
      list_header,
      precedence: first("Precedence"),
      response_suppress: first("X-Auto-Response-Suppress"),
      recipients,
    })
  }

  /// The reply destination: `envelope` if given, else the mbox `From `
  /// line, else `Return-Path`.
  pub fn sender<'a>(&'a self, envelope: Option<&'a str>) -> Option<&'a str> {
    envelope
      .or(self.mbox_sender.as_deref())
      .or(self.return_path.as_deref())
  }

  /// Decide whether to answer this message on behalf of a recipient known by
  /// `aliases`.
  pub fn screen(&self, envelope: Option<&str>, aliases: &[String]) -> Screening {
    match self.check(envelope, aliases) {
      Ok(sender) => Screening::Reply(sender),
      Err(reason) => Screening::Skip(reason),
    }
  }

  fn check(&self, envelope: Option<&str>, aliases: &[String]) -> Result<Identity, SkipReason> {
    if let Some(value) = &self.auto_submitted {
      let keyword = value
        .split(|c: char| c == ';' || c == '(' || c.is_whitespace())
        .next()
        .unwrap_or_default();
      if !keyword.eq_ignore_ascii_case("no") {
        return Err(SkipReason::AutoSubmitted(value.clone()));
      }
    }

    if let Some(name) = &self.list_header {
      return Err(SkipReason::MailingList(name.clone()));
    }

    if let Some(value) = &self.precedence {
      let class = value
        .split(|c: char| c == ';' || c == '(' || c.is_whitespace())
        .next()
        .unwrap_or_default();
      if BULK_PRECEDENCE.iter().any(|p| class.eq_ignore_ascii_case(p)) {
        return Err(SkipReason::Precedence(value.clone()));
      }
    }

    if let Some(value) = &self.response_suppress {
      let suppressed = value
        .split(',')
        .map(str::trim)
        .any(|token| token.eq_ignore_ascii_case("OOF") || token.eq_ignore_ascii_case("All"));
      if suppressed {
        return Err(SkipReason::ResponseSuppressed(value.clone()));
      }
    }

    let raw_sender = self
      .sender(envelope)
      .map(str::trim)
      .ok_or(SkipReason::UnknownSender)?;

    if !self.is_addressed_to(aliases) {
      return Err(SkipReason::NotAddressed);
    }

    let bare = strip_brackets(raw_sender);
    if bare.is_empty() {
      return Err(SkipReason::RestrictedSender("<>".to_owned()));
    }

    let canonical = canonicalize_srs(bare);
    if let Some(canonical) = &canonical {
      tracing::debug!(srs = bare, sender = %canonical, "rewrote SRS sender");
    }
    let sender = Identity::parse(canonical.as_deref().unwrap_or(bare))
      .map_err(|_| SkipReason::InvalidSender(raw_sender.to_owned()))?;

    if is_restricted(sender.local_part()) {
      return Err(SkipReason::RestrictedSender(sender.address()));
    }
    Ok(sender)
  }

  /// Whether any alias occurs in a `To` or `Cc` value. Matching ignores case
  /// and treats `.` and `_` as spaces, so `Test Recipient` matches
  /// `test.recipient@example.com`.
  fn is_addressed_to(&self, aliases: &[String]) -> bool {
    let haystacks: Vec<String> = self.recipients.iter().map(|r| fold(r)).collect();
    aliases
      .iter()
      .map(|a| fold(a))
      .filter(|a| !a.trim().is_empty())
      .any(|alias| haystacks.iter().any(|h| h.contains(&alias)))
  }
}

fn fold(s: &str) -> String {
  s.chars()
    .map(|c| if c == '.' || c == '_' { ' ' } else { c })
    .flat_map(char::to_lowercase)
    .collect()
}

fn strip_brackets(s: &str) -> &str {
  s.strip_prefix('<')
    .and_then(|s| s.strip_suffix('>'))
    .unwrap_or(s)
    .trim()
}

/// Software senders, and anything a delivery command would read as an option.
fn is_restricted(local_part: &str) -> bool {
  local_part.starts_with('-')
    || RESTRICTED_LOCAL_PARTS.contains(&local_part)
    || RESTRICTED_SUFFIXES.iter().any(|suffix| local_part.ends_with(suffix))
}

/// Split off a leading mbox `From sender date` line, returning its sender.
fn split_mbox_line(raw: &[u8]) -> (Option<String>, &[u8]) {
  if raw.len() < 5 || !raw[..5].eq_ignore_ascii_case(b"From ") {
    return (None, raw);
  }

  let (line, rest) = match raw.iter().position(|&b| b == b'\n') {
    Some(idx) => (&raw[5..idx], &raw[idx + 1..]),
    None => (&raw[5..], &[][..]),
  };
  let sender = String::from_utf8_lossy(line)
    .split_whitespace()
    .next()
    .map(str::to_owned);
  (sender, rest)
}

/// Rewrite an SRS-forwarded address back to the original sender.
///
/// `SRS0=hash=tt=domain=local@forwarder` becomes `local@domain`; for `SRS1`
/// everything up to `==` names earlier forwarders and is skipped first. The
/// hash and timestamp are not verified.
fn canonicalize_srs(address: &str) -> Option<String> {
  let b = address.as_bytes();
  if b.len() <= 13
    || !b[..3].eq_ignore_ascii_case(b"SRS")
    || !matches!(b[3], b'0' | b'1')
    || !matches!(b[4], b'=' | b'-' | b'+')
  {
    return None;
  }

  let rest = if b[3] == b'1' {
    &address[address.find("==")? + 2..]
  } else {
    &address[5..]
  };

  let mut parts = rest.splitn(4, '=');
  let (_hash, _timestamp) = (parts.next()?, parts.next()?);
  let domain = parts.next()?;
  let tail = parts.next()?;
  let local = tail.rsplit_once('@').map_or(tail, |(local, _)| local);

  if domain.is_empty() || local.is_empty() {
    return None;
  }
  Some(format!("{local}@{domain}"))
}
