//! Wiring one invocation together: configuration, backends, engine.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use absent_core::Identity;

use crate::{
  backend::{LazyVdb, Vlu},
  config::{interval_from_secs, Config},
  delivery::SendmailDelivery,
  engine::{Engine, Outcome, Request},
  Error, Result,
};

/// Everything the caller supplies besides the message itself.
#[derive(Debug, Clone)]
pub struct Invocation {
  pub config:    PathBuf,
  pub sender:    Option<String>,
  /// Overrides `core.interval`, in seconds.
  pub interval:  Option<u64>,
  pub recipient: String,
}

/// Handle one message end to end.
///
/// The store is opened only once a reply is being considered, and every
/// backend is dropped before returning, whatever the outcome.
pub async fn run(invocation: &Invocation, message: &[u8], now: DateTime<Utc>) -> Result<Outcome> {
  let config = Config::load(&invocation.config)?;
  let recipient = Identity::parse(&invocation.recipient).map_err(Error::Recipient)?;
  let interval = invocation
    .interval
    .map(interval_from_secs)
    .unwrap_or_else(|| config.interval());

  let delivery = SendmailDelivery::new(&config.core.sendmail)?;
  let vlu = Vlu::from_config(&config)?;
  let vdb = LazyVdb::from_config(&config, interval)?;
  tracing::debug!(vdb = ?config.core.vdb, vlu = ?config.core.vlu, "backends configured");

  let engine = Engine::new(vlu, vdb, delivery, interval, config.core.domain.clone());
  engine
    .process(
      Request {
        recipient: &recipient,
        sender:    invocation.sender.as_deref(),
        message,
      },
      now,
    )
    .await
}
