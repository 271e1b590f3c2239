//! absent binary.
//!
//! Invoked by the mail system once per message, with the message on stdin:
//!
//! ```text
//! absent [-c CONFIG] [-f SENDER] [-d] [--interval SECONDS] RECIPIENT < message
//! ```
//!
//! Exits 0 whenever the message was handled, replied to or not, and with a
//! sysexits status otherwise.

use std::{path::PathBuf, process::ExitCode};

use absent::{
  config::DEFAULT_CONFIG_PATH,
  error::{EX_TEMPFAIL, EX_USAGE},
  Invocation, Outcome,
};
use chrono::Utc;
use clap::Parser;
use tokio::io::AsyncReadExt as _;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Vacation auto-responder")]
struct Cli {
  /// Path to the configuration file.
  #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
  config: PathBuf,

  /// Envelope sender of the message being answered.
  #[arg(short = 'f', long = "from", value_name = "SENDER")]
  from: Option<String>,

  /// Log at debug level.
  #[arg(short, long)]
  debug: bool,

  /// Seconds between replies to the same sender, overriding the config.
  #[arg(long, value_name = "SECONDS")]
  interval: Option<u64>,

  /// Recipient on whose behalf to reply; a bare local part or an address.
  recipient: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
  let cli = match Cli::try_parse() {
    Ok(cli) => cli,
    Err(e) => {
      let _ = e.print();
      return if e.use_stderr() { exit(EX_USAGE) } else { ExitCode::SUCCESS };
    }
  };

  let level = if cli.debug { LevelFilter::DEBUG } else { LevelFilter::INFO };
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy(),
    )
    .init();

  let mut message = Vec::new();
  if let Err(e) = tokio::io::stdin().read_to_end(&mut message).await {
    tracing::error!(error = %e, "failed to read message from stdin");
    return exit(EX_TEMPFAIL);
  }

  let invocation = Invocation {
    config:    cli.config,
    sender:    cli.from,
    interval:  cli.interval,
    recipient: cli.recipient,
  };

  match absent::run(&invocation, &message, Utc::now()).await {
    Ok(outcome) => {
      if outcome != Outcome::Sent {
        tracing::debug!(?outcome, "no reply sent");
      }
      ExitCode::SUCCESS
    }
    Err(e) => {
      tracing::error!(error = %e, "failed to process message");
      exit(e.exit_code())
    }
  }
}

fn exit(code: i32) -> ExitCode { ExitCode::from(u8::try_from(code).unwrap_or(1)) }
