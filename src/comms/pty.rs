//! PTY (console) channel — reads lines from stdin, hands them to the
//! handlers, prints the reply to stdout.
//!
//! Runs until the `shutdown` token is cancelled (Ctrl-C) or stdin is closed.
//! Every console line is attributed to [`CONSOLE_USER_ID`].

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::handlers::BotHandlers;
use crate::mediator::UserId;
use super::runtime::{Component, ComponentFuture};

/// User id for the single local console user.
pub const CONSOLE_USER_ID: UserId = 0;

pub struct PtyChannel {
    channel_id: String,
    bot_name: String,
    handlers: Arc<BotHandlers>,
}

impl PtyChannel {
    pub fn new(channel_id: impl Into<String>, bot_name: impl Into<String>, handlers: Arc<BotHandlers>) -> Self {
        Self { channel_id: channel_id.into(), bot_name: bot_name.into(), handlers }
    }
}

impl Component for PtyChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_pty(self.channel_id, self.bot_name, self.handlers, shutdown))
    }
}

async fn run_pty(
    channel_id: String,
    bot_name: String,
    handlers: Arc<BotHandlers>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    info!(%channel_id, "pty channel started");
    println!("─────────────────────────────────");
    println!(" {bot_name} console  (Ctrl-C to quit)");
    println!(" type /start for the command list");
    println!("─────────────────────────────────");

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        print!("> ");
        use std::io::Write as _;
        let _ = std::io::stdout().flush();

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                println!();
                info!(%channel_id, "shutdown signal received, closing console channel");
                break;
            }

            line = lines.next_line() => {
                match line {
                    Err(e) => {
                        warn!("pty read error: {e}");
                        break;
                    }
                    Ok(None) => {
                        info!("pty stdin closed");
                        break;
                    }
                    Ok(Some(input)) => {
                        let input = input.trim();
                        if input.is_empty() { continue; }

                        debug!(%input, "pty received line");
                        let reply = handlers.handle(CONSOLE_USER_ID, None, input).await;
                        println!("{reply}");
                    }
                }
            }
        }
    }

    Ok(())
}
