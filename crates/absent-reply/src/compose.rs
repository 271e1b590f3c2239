//! Rendering the automatic reply (RFC 3834 §3).

use absent_core::{Identity, Policy};

use crate::encode::{display_name, encode_word, sanitize};

pub const GROUP_SUBJECT_PREFIX: &str = "Automated Reply";
pub const PERSONAL_SUBJECT_PREFIX: &str = "Out of email contact";

/// The parts of the inbound message a reply refers back to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Original {
  pub subject:     String,
  pub message_id:  Option<String>,
  pub in_reply_to: Option<String>,
  pub references:  Option<String>,
}

/// A complete reply: ordered header fields and body lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReply {
  pub headers: Vec<(&'static str, String)>,
  pub body:    Vec<String>,
}

impl RenderedReply {
  /// The value of the first header named `name`, compared case-insensitively.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  /// The message as handed to the delivery command, with `\n` line endings.
  pub fn render(&self) -> String {
    let mut out = String::new();
    for (name, value) in &self.headers {
      out.push_str(name);
      out.push_str(": ");
      out.push_str(value);
      out.push('\n');
    }
    out.push('\n');
    for line in &self.body {
      out.push_str(line);
      out.push('\n');
    }
    out
  }
}

/// Build the reply that `recipient` sends back to `sender`.
///
/// A recipient without a domain is qualified with `domain` for the `From`
/// address.
pub fn compose(
  policy: &Policy,
  sender: &Identity,
  recipient: &Identity,
  original: &Original,
  domain: &str,
) -> RenderedReply {
  let from_address = recipient.with_default_domain(domain).address();
  let from = match policy.display_name.as_deref().map(sanitize) {
    Some(name) if !name.is_empty() => format!("{} <{from_address}>", display_name(&name)),
    _ => from_address,
  };

  let mut headers = vec![
    ("From", from),
    ("To", sender.address()),
    ("Subject", encode_word(&subject(policy.is_group, &original.subject))),
  ];

  let message_id = original
    .message_id
    .as_deref()
    .map(sanitize)
    .filter(|id| !id.is_empty());
  if let Some(message_id) = message_id {
    let references = references(original, &message_id);
    headers.push(("In-Reply-To", message_id));
    headers.push(("References", references));
  }

  headers.extend([
    ("Auto-Submitted", "auto-replied".to_owned()),
    ("MIME-Version", "1.0".to_owned()),
    ("Content-Type", "text/plain; charset=UTF-8".to_owned()),
    ("Content-Transfer-Encoding", "8bit".to_owned()),
  ]);

  RenderedReply {
    headers,
    body: policy.body_lines().into_iter().map(str::to_owned).collect(),
  }
}

fn subject(is_group: bool, original: &str) -> String {
  let prefix = if is_group { GROUP_SUBJECT_PREFIX } else { PERSONAL_SUBJECT_PREFIX };
  let original = sanitize(original);
  if original.is_empty() {
    prefix.to_owned()
  } else {
    format!("{prefix} (Re: {original})")
  }
}

/// RFC 5322 §3.6.4: the parent's References, or failing that a single-id
/// In-Reply-To, followed by the parent's Message-ID.
fn references(original: &Original, message_id: &str) -> String {
  let parent = original
    .references
    .as_deref()
    .map(sanitize)
    .filter(|r| !r.is_empty())
    .or_else(|| {
      original
        .in_reply_to
        .as_deref()
        .map(sanitize)
        .filter(|irt| irt.matches('<').count() == 1)
    });

  match parent {
    Some(parent) => format!("{parent} {message_id}"),
    None => message_id.to_owned(),
  }
}
