//! Handing the rendered reply to the mail system.

use std::{future::Future, process::Stdio};

use thiserror::Error;
use tokio::{io::AsyncWriteExt as _, process::Command};

use absent_core::Identity;

use crate::error::EX_TEMPFAIL;

#[derive(Debug, Error)]
pub enum DeliveryError {
  #[error("delivery command is empty")]
  EmptyCommand,

  #[error("invalid delivery command: {0}")]
  Template(#[from] shell_words::ParseError),

  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source:  std::io::Error,
  },

  #[error("{program} exited with status {code}")]
  Exit { program: String, code: i32 },

  #[error("{program} was killed by a signal")]
  Killed { program: String },
}

impl DeliveryError {
  /// The command's own status when it ran and failed; `EX_TEMPFAIL` when it
  /// never ran or was killed.
  pub fn exit_code(&self) -> i32 {
    match self {
      Self::Exit { code, .. } => *code,
      Self::EmptyCommand | Self::Template(_) | Self::Spawn { .. } | Self::Killed { .. } => {
        EX_TEMPFAIL
      }
    }
  }
}

/// Sends a finished message to one recipient.
pub trait Delivery: Send + Sync {
  fn deliver<'a>(
    &'a self,
    recipient: &'a Identity,
    message: &'a [u8],
  ) -> impl Future<Output = Result<(), DeliveryError>> + Send + 'a;
}

// ─── Sendmail ────────────────────────────────────────────────────────────────

/// Pipes the message into a sendmail-compatible command.
///
/// The template is split like a shell would split it. In every argument,
/// `$R` becomes the reply recipient and `$S` the envelope sender, which is
/// always null for an automatic reply.
#[derive(Debug, Clone)]
pub struct SendmailDelivery {
  argv: Vec<String>,
}

impl SendmailDelivery {
  pub fn new(template: &str) -> Result<Self, DeliveryError> {
    let argv = shell_words::split(template)?;
    if argv.is_empty() {
      return Err(DeliveryError::EmptyCommand);
    }
    Ok(Self { argv })
  }

  /// The argument vector for a reply to `recipient`.
  pub fn command_for(&self, recipient: &Identity) -> Vec<String> {
    let recipient = recipient.address();
    self
      .argv
      .iter()
      .map(|arg| arg.replace("$R", &recipient).replace("$S", ""))
      .collect()
  }
}

impl Delivery for SendmailDelivery {
  async fn deliver(&self, recipient: &Identity, message: &[u8]) -> Result<(), DeliveryError> {
    let argv = self.command_for(recipient);
    let (program, args) = argv.split_first().ok_or(DeliveryError::EmptyCommand)?;
    let spawn_error = |source| DeliveryError::Spawn { program: program.clone(), source };

    tracing::debug!(?argv, "running delivery command");
    let mut child = Command::new(program)
      .args(args)
      .stdin(Stdio::piped())
      .stdout(Stdio::null())
      .kill_on_drop(true)
      .spawn()
      .map_err(spawn_error)?;

    let written = match child.stdin.take() {
      Some(mut stdin) => {
        let result = stdin.write_all(message).await;
        drop(stdin);
        result
      }
      None => Ok(()),
    };

    let status = child.wait().await.map_err(spawn_error)?;
    match status.code() {
      Some(0) => written.map_err(spawn_error),
      Some(code) => Err(DeliveryError::Exit { program: program.clone(), code }),
      None => Err(DeliveryError::Killed { program: program.clone() }),
    }
  }
}
