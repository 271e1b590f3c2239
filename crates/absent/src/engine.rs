//! The decision engine: one inbound message in, at most one reply out.

use chrono::{DateTime, TimeDelta, Utc};

use absent_core::{
  lookup::PolicyLookup, store::SuppressionStore, Claim, Identity, SuppressionKey,
};
use absent_reply::{compose, InboundMessage, Screening, SkipReason};

use crate::{delivery::Delivery, Error, Result};

/// What happened to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  /// The recipient is not on vacation.
  Inactive,
  /// The message is not one to answer.
  Ignored(SkipReason),
  /// This sender was answered within the interval.
  Suppressed,
  Sent,
}

/// One invocation's input.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
  pub recipient: &'a Identity,
  /// Envelope sender from the command line, if the mail system passed one.
  pub sender:    Option<&'a str>,
  pub message:   &'a [u8],
}

pub struct Engine<L, S, D> {
  lookup:   L,
  store:    S,
  delivery: D,
  interval: TimeDelta,
  domain:   String,
}

impl<L, S, D> Engine<L, S, D>
where
  L: PolicyLookup,
  S: SuppressionStore,
  D: Delivery,
{
  pub fn new(
    lookup: L,
    store: S,
    delivery: D,
    interval: TimeDelta,
    domain: impl Into<String>,
  ) -> Self {
    Self { lookup, store, delivery, interval, domain: domain.into() }
  }

  pub fn store(&self) -> &S { &self.store }

  /// Decide on and, if warranted, send the reply for `request`.
  pub async fn process(&self, request: Request<'_>, now: DateTime<Utc>) -> Result<Outcome> {
    let recipient = request.recipient.with_default_domain(&self.domain);

    let policy = self
      .lookup
      .resolve(&recipient, now)
      .await
      .map_err(Error::lookup)?;
    if !policy.is_active_at(now) {
      tracing::debug!(%recipient, "recipient not on vacation");
      return Ok(Outcome::Inactive);
    }

    let message = InboundMessage::parse(request.message)?;
    let sender = match message.screen(request.sender, &policy.aliases) {
      Screening::Reply(sender) => sender,
      Screening::Skip(reason) => {
        tracing::info!(%recipient, %reason, "not replying");
        return Ok(Outcome::Ignored(reason));
      }
    };

    let key = SuppressionKey::new(&sender, &recipient);
    if self
      .store
      .should_suppress(&key, now, self.interval)
      .await
      .map_err(Error::store)?
    {
      tracing::info!(%recipient, %sender, "already replied within interval");
      return Ok(Outcome::Suppressed);
    }

    let Claim::Acquired { claimed_at, previous } = self
      .store
      .claim(&key, now, self.interval)
      .await
      .map_err(Error::store)?
    else {
      tracing::info!(%recipient, %sender, "concurrent invocation already replying");
      return Ok(Outcome::Suppressed);
    };

    let reply = compose(&policy, &sender, &recipient, &message.original, &self.domain);
    if let Err(e) = self.delivery.deliver(&sender, reply.render().as_bytes()).await {
      tracing::error!(%recipient, %sender, error = %e, "delivery failed");
      // The delivery status decides whether the mail system retries, so it
      // wins over a failed release. The claim then stands until the interval
      // passes and this sender gets no reply before that.
      if let Err(release) = self.store.release(&key, claimed_at, previous).await {
        tracing::error!(%key, error = %release, "failed to release claim; sender stays suppressed");
      }
      return Err(e.into());
    }

    // The claim already holds this send, so a failure here only loses the
    // refresh, not the suppression.
    if let Err(e) = self.store.record_sent(&key, now).await {
      tracing::warn!(%key, error = %e, "failed to record reply");
    }
    tracing::info!(%recipient, %sender, "sent vacation reply");
    Ok(Outcome::Sent)
  }
}

#[cfg(test)]
mod tests {
  use std::{
    convert::Infallible,
    io,
    sync::{
      atomic::{AtomicBool, Ordering},
      Mutex,
    },
  };

  use absent_core::{lookup::NullLookup, store::NullStore, Policy, Window};
  use absent_store_sqlite::SqliteStore;

  use super::*;
  use crate::delivery::DeliveryError;

  const MESSAGE: &[u8] = b"From: Test Sender <testsender@example.com>\n\
                           To: testrcpt@example.com\n\
                           Subject: simta test message for test_simple\n\
                           \n\
                           Hello.\n";

  /// Records every message instead of sending it.
  #[derive(Default)]
  struct Outbox {
    sent: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
  }

  impl Outbox {
    fn count(&self) -> usize { self.sent.lock().unwrap().len() }
  }

  impl Delivery for &Outbox {
    async fn deliver(&self, recipient: &Identity, message: &[u8]) -> Result<(), DeliveryError> {
      if self.fail.load(Ordering::SeqCst) {
        return Err(DeliveryError::Exit { program: "fake".into(), code: 69 });
      }
      let message = String::from_utf8_lossy(message).into_owned();
      self.sent.lock().unwrap().push((recipient.address(), message));
      Ok(())
    }
  }

  /// A fixed policy for every recipient.
  struct FixedPolicy(Policy);

  impl PolicyLookup for FixedPolicy {
    type Error = Infallible;

    async fn resolve(&self, _: &Identity, _: DateTime<Utc>) -> Result<Policy, Infallible> {
      Ok(self.0.clone())
    }
  }

  /// A directory that is always down.
  struct FailingLookup;

  impl PolicyLookup for FailingLookup {
    type Error = io::Error;

    async fn resolve(&self, _: &Identity, _: DateTime<Utc>) -> Result<Policy, io::Error> {
      Err(io::Error::from(io::ErrorKind::ConnectionRefused))
    }
  }

  /// Panics on any access; proves a path never touches the store.
  struct UntouchableStore;

  impl SuppressionStore for UntouchableStore {
    type Error = Infallible;

    async fn should_suppress(
      &self,
      _: &SuppressionKey,
      _: DateTime<Utc>,
      _: TimeDelta,
    ) -> Result<bool, Infallible> {
      panic!("store consulted")
    }

    async fn claim(
      &self,
      _: &SuppressionKey,
      _: DateTime<Utc>,
      _: TimeDelta,
    ) -> Result<Claim, Infallible> {
      panic!("store consulted")
    }

    async fn release(
      &self,
      _: &SuppressionKey,
      _: DateTime<Utc>,
      _: Option<DateTime<Utc>>,
    ) -> Result<(), Infallible> {
      panic!("store consulted")
    }

    async fn record_sent(&self, _: &SuppressionKey, _: DateTime<Utc>) -> Result<(), Infallible> {
      panic!("store consulted")
    }
  }

  /// Fails one operation and lets the others through with an empty record.
  struct FailingStore(&'static str);

  impl FailingStore {
    fn check(&self, op: &str) -> Result<(), io::Error> {
      if self.0 == op {
        return Err(io::Error::other(format!("{op} failed")));
      }
      Ok(())
    }
  }

  impl SuppressionStore for FailingStore {
    type Error = io::Error;

    async fn should_suppress(
      &self,
      _: &SuppressionKey,
      _: DateTime<Utc>,
      _: TimeDelta,
    ) -> Result<bool, io::Error> {
      self.check("should_suppress").map(|()| false)
    }

    async fn claim(
      &self,
      _: &SuppressionKey,
      now: DateTime<Utc>,
      _: TimeDelta,
    ) -> Result<Claim, io::Error> {
      self
        .check("claim")
        .map(|()| Claim::Acquired { claimed_at: now, previous: None })
    }

    async fn release(
      &self,
      _: &SuppressionKey,
      _: DateTime<Utc>,
      _: Option<DateTime<Utc>>,
    ) -> Result<(), io::Error> {
      self.check("release")
    }

    async fn record_sent(&self, _: &SuppressionKey, _: DateTime<Utc>) -> Result<(), io::Error> {
      self.check("record_sent")
    }
  }

  fn rcpt() -> Identity { Identity::parse("testrcpt").unwrap() }

  fn request<'a>(recipient: &'a Identity) -> Request<'a> {
    Request { recipient, sender: Some("testsender@example.com"), message: MESSAGE }
  }

  fn active(window: Window) -> Policy {
    Policy { active: true, window, aliases: vec!["testrcpt".into()], ..Policy::default() }
  }

  /// An engine with a two second interval that delivers into `outbox`.
  fn engine<L, S>(lookup: L, store: S, outbox: &Outbox) -> Engine<L, S, &Outbox>
  where
    L: PolicyLookup,
    S: SuppressionStore,
  {
    Engine::new(lookup, store, outbox, TimeDelta::seconds(2), "example.com")
  }

  #[tokio::test]
  async fn simple_reply() {
    let outbox = Outbox::default();
    let engine = engine(NullLookup, NullStore, &outbox);
    let rcpt = rcpt();

    assert_eq!(engine.process(request(&rcpt), Utc::now()).await.unwrap(), Outcome::Sent);

    let sent = outbox.sent.lock().unwrap();
    let (to, message) = &sent[0];
    assert_eq!(to, "testsender@example.com");
    assert!(message.starts_with("From: testrcpt@example.com\n"));
    assert!(
      message.contains("Subject: Out of email contact (Re: simta test message for test_simple)\n")
    );
    assert!(message.contains("Auto-Submitted: auto-replied\n"));
    assert!(message.ends_with(
      "\n\nI am currently out of email contact.\nYour mail will be read when I return.\n"
    ));
  }

  #[tokio::test]
  async fn null_store_answers_every_time() {
    let outbox = Outbox::default();
    let engine = Engine::new(NullLookup, NullStore, &outbox, TimeDelta::days(7), "example.com");
    let rcpt = rcpt();

    for _ in 0..3 {
      engine.process(request(&rcpt), Utc::now()).await.unwrap();
    }
    assert_eq!(outbox.count(), 3);
  }

  #[tokio::test]
  async fn inactive_recipient_never_touches_the_store() {
    let outbox = Outbox::default();
    let engine = engine(FixedPolicy(Policy::inactive()), UntouchableStore, &outbox);
    let rcpt = rcpt();

    assert_eq!(engine.process(request(&rcpt), Utc::now()).await.unwrap(), Outcome::Inactive);
    assert_eq!(outbox.count(), 0);
  }

  #[tokio::test]
  async fn failed_lookup_never_touches_the_store() {
    let outbox = Outbox::default();
    let engine = engine(FailingLookup, UntouchableStore, &outbox);
    let rcpt = rcpt();

    let err = engine.process(request(&rcpt), Utc::now()).await.unwrap_err();
    assert!(matches!(err, Error::Lookup(_)));
    assert_eq!(err.exit_code(), 75);
    assert_eq!(outbox.count(), 0);
  }

  #[tokio::test]
  async fn screened_message_never_touches_the_store() {
    let outbox = Outbox::default();
    let engine = engine(NullLookup, UntouchableStore, &outbox);
    let rcpt = rcpt();
    let bulk = [b"Precedence: bulk\n".as_slice(), MESSAGE].concat();

    let outcome = engine
      .process(Request { message: &bulk, ..request(&rcpt) }, Utc::now())
      .await
      .unwrap();
    assert!(matches!(outcome, Outcome::Ignored(SkipReason::Precedence(_))));
    assert_eq!(outbox.count(), 0);
  }

  #[tokio::test]
  async fn option_shaped_sender_is_not_answered() {
    let outbox = Outbox::default();
    let engine = engine(NullLookup, UntouchableStore, &outbox);
    let rcpt = rcpt();

    let outcome = engine
      .process(Request { sender: Some("-X/tmp/log@example.com"), ..request(&rcpt) }, Utc::now())
      .await
      .unwrap();
    assert!(matches!(outcome, Outcome::Ignored(SkipReason::RestrictedSender(_))));
    assert_eq!(outbox.count(), 0);
  }

  #[tokio::test]
  async fn store_failure_before_delivery_sends_nothing() {
    for op in ["should_suppress", "claim"] {
      let outbox = Outbox::default();
      let engine = engine(NullLookup, FailingStore(op), &outbox);
      let rcpt = rcpt();

      let err = engine.process(request(&rcpt), Utc::now()).await.unwrap_err();
      assert!(matches!(err, Error::Store(_)), "{op}: {err}");
      assert_eq!(err.exit_code(), 75);
      assert_eq!(outbox.count(), 0, "{op}");
    }
  }

  #[tokio::test]
  async fn failed_record_still_counts_as_sent() {
    let outbox = Outbox::default();
    let engine = engine(NullLookup, FailingStore("record_sent"), &outbox);
    let rcpt = rcpt();

    assert_eq!(engine.process(request(&rcpt), Utc::now()).await.unwrap(), Outcome::Sent);
    assert_eq!(outbox.count(), 1);
  }

  #[tokio::test]
  async fn failed_release_keeps_delivery_status() {
    let outbox = Outbox::default();
    outbox.fail.store(true, Ordering::SeqCst);
    let engine = engine(NullLookup, FailingStore("release"), &outbox);
    let rcpt = rcpt();

    let err = engine.process(request(&rcpt), Utc::now()).await.unwrap_err();
    assert!(matches!(err, Error::Delivery(_)));
    assert_eq!(err.exit_code(), 69);
  }

  #[tokio::test]
  async fn second_message_within_interval_is_suppressed() {
    let outbox = Outbox::default();
    let store = SqliteStore::open_in_memory().await.unwrap();
    let engine = engine(NullLookup, store, &outbox);
    let rcpt = rcpt();
    let now = Utc::now();

    assert_eq!(engine.process(request(&rcpt), now).await.unwrap(), Outcome::Sent);
    assert_eq!(engine.process(request(&rcpt), now).await.unwrap(), Outcome::Suppressed);
    assert_eq!(outbox.count(), 1);

    let later = now + TimeDelta::seconds(3);
    assert_eq!(engine.process(request(&rcpt), later).await.unwrap(), Outcome::Sent);
    assert_eq!(outbox.count(), 2);
  }

  #[tokio::test]
  async fn failed_delivery_leaves_store_unchanged() {
    let outbox = Outbox::default();
    outbox.fail.store(true, Ordering::SeqCst);
    let store = SqliteStore::open_in_memory().await.unwrap();
    let engine = Engine::new(NullLookup, store, &outbox, TimeDelta::days(1), "example.com");
    let rcpt = rcpt();
    let now = Utc::now();

    let err = engine.process(request(&rcpt), now).await.unwrap_err();
    assert_eq!(err.exit_code(), 69);

    let key = SuppressionKey::new(
      &Identity::parse("testsender@example.com").unwrap(),
      &Identity::parse("testrcpt@example.com").unwrap(),
    );
    assert!(engine.store().get(&key).await.unwrap().is_none());

    outbox.fail.store(false, Ordering::SeqCst);
    assert_eq!(engine.process(request(&rcpt), now).await.unwrap(), Outcome::Sent);
  }

  #[tokio::test]
  async fn autoreply_windows() {
    let now = Utc::now();
    let day = TimeDelta::days(1);
    let cases = [
      (Window::new(None, Some(now - day)), Outcome::Inactive),
      (Window::new(Some(now + day), None), Outcome::Inactive),
      (Window::new(Some(now + day), Some(now + day * 2)), Outcome::Inactive),
      (Window::new(Some(now - day), None), Outcome::Sent),
      (Window::new(Some(now - day), Some(now + day)), Outcome::Sent),
    ];

    for (window, expected) in cases {
      let outbox = Outbox::default();
      let engine = engine(FixedPolicy(active(window)), NullStore, &outbox);
      let rcpt = rcpt();
      assert_eq!(engine.process(request(&rcpt), now).await.unwrap(), expected, "{window:?}");
    }
  }

  #[tokio::test]
  async fn group_recipient_subject() {
    let outbox = Outbox::default();
    let policy = Policy { is_group: true, ..active(Window::UNBOUNDED) };
    let engine = engine(FixedPolicy(policy), NullStore, &outbox);
    let rcpt = rcpt();

    engine.process(request(&rcpt), Utc::now()).await.unwrap();
    let sent = outbox.sent.lock().unwrap();
    assert!(
      sent[0].1.contains("Subject: Automated Reply (Re: simta test message for test_simple)\n")
    );
  }

  #[tokio::test]
  async fn dos_line_breaks_in_custom_message() {
    let outbox = Outbox::default();
    let body = absent_core::policy::normalize_line_breaks("One.\r\nTwo.\r\n\r\nThree.");
    let policy = Policy { message_body: Some(body), ..active(Window::UNBOUNDED) };
    let engine = engine(FixedPolicy(policy), NullStore, &outbox);
    let rcpt = rcpt();

    engine.process(request(&rcpt), Utc::now()).await.unwrap();
    let sent = outbox.sent.lock().unwrap();
    assert!(sent[0].1.ends_with("\n\nOne.\nTwo.\n\nThree.\n"));
  }
}
