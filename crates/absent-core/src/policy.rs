//! Policy — the vacation facts resolved for one recipient.

use chrono::{DateTime, Utc};

/// The reply body used when the recipient has no custom message.
pub const DEFAULT_MESSAGE: &str =
  "I am currently out of email contact.\nYour mail will be read when I return.";

// ─── Autoreply window ────────────────────────────────────────────────────────

/// An optional, inclusive time range during which a policy applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
  pub start: Option<DateTime<Utc>>,
  pub end:   Option<DateTime<Utc>>,
}

impl Window {
  /// A window with neither bound; always open.
  pub const UNBOUNDED: Self = Self { start: None, end: None };

  pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
    Self { start, end }
  }

  /// Both bounds are inclusive. A missing bound does not constrain.
  pub fn contains(&self, now: DateTime<Utc>) -> bool {
    let after_start = self.start.is_none_or(|start| now >= start);
    let before_end  = self.end.is_none_or(|end| now <= end);
    after_start && before_end
  }
}

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Vacation decision facts for one recipient, produced once per request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Policy {
  /// The directory says the recipient is on vacation.
  pub active:       bool,
  /// The recipient resolved to a group rather than a person.
  pub is_group:     bool,
  pub display_name: Option<String>,
  /// Custom reply body, already normalized to `\n` line breaks.
  pub message_body: Option<String>,
  pub window:       Window,
  /// Names the recipient may be addressed by in `To`/`Cc`.
  pub aliases:      Vec<String>,
}

impl Policy {
  /// The policy for a recipient with no vacation configured.
  pub fn inactive() -> Self { Self::default() }

  /// Whether a reply may be composed at `now`: the flag is set and `now`
  /// falls inside the autoreply window.
  pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
    self.active && self.window.contains(now)
  }

  /// The reply body lines, falling back to [`DEFAULT_MESSAGE`].
  pub fn body_lines(&self) -> Vec<&str> {
    self
      .message_body
      .as_deref()
      .unwrap_or(DEFAULT_MESSAGE)
      .lines()
      .collect()
  }
}

/// Rewrite CRLF and lone CR line breaks as `\n`, leaving line content intact.
pub fn normalize_line_breaks(s: &str) -> String {
  s.replace("\r\n", "\n").replace('\r', "\n")
}
