//! Telegram channel — receives messages via the Telegram Bot API, hands them
//! to the handlers and replies to the user.

use std::env;
use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::ChatAction;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::handlers::BotHandlers;
use super::runtime::{Component, ComponentFuture};

/// Telegram has a 4096 character limit per message.
/// We chunk at 4000 to be safe.
const MAX_MESSAGE_LENGTH: usize = 4000;

pub struct TelegramChannel {
    channel_id: String,
    handlers: Arc<BotHandlers>,
}

impl TelegramChannel {
    pub fn new(channel_id: impl Into<String>, handlers: Arc<BotHandlers>) -> Self {
        Self { channel_id: channel_id.into(), handlers }
    }
}

impl Component for TelegramChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_telegram(self.channel_id, self.handlers, shutdown))
    }
}

/// Split `text` into Telegram-sized pieces on char boundaries.
pub fn chunk_reply(text: &str) -> Vec<String> {
    if text.is_empty() {
        return vec!["(empty response)".to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(MAX_MESSAGE_LENGTH)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

async fn run_telegram(
    channel_id: String,
    handlers: Arc<BotHandlers>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let token = match env::var("TELEGRAM_BOT_TOKEN") {
        Ok(t) => t,
        Err(_) => {
            warn!(%channel_id, "TELEGRAM_BOT_TOKEN not set, telegram channel exiting");
            return Ok(());
        }
    };

    info!(%channel_id, "telegram channel starting");

    let bot = Bot::new(token);

    let handler = Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
        let handlers = handlers.clone();
        async move {
            let (Some(text), Some(user)) = (msg.text(), msg.from.as_ref()) else {
                return respond(());
            };
            debug!(user_id = user.id.0, username = ?user.username, "telegram received message");

            if let Err(e) = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await {
                debug!("failed to send typing action: {e}");
            }

            let reply = handlers.handle(user.id.0, user.username.as_deref(), text).await;
            for chunk in chunk_reply(&reply) {
                if let Err(e) = bot.send_message(msg.chat.id, chunk).await {
                    warn!("failed to send telegram reply: {e}");
                }
            }
            respond(())
        }
    });

    let mut dispatcher = Dispatcher::builder(bot, handler).build();

    tokio::select! {
        biased;

        _ = shutdown.cancelled() => {
            info!(%channel_id, "shutdown signal received, closing telegram channel");
        }
        _ = dispatcher.dispatch() => {
            warn!(%channel_id, "telegram dispatcher exited unexpectedly");
        }
    }

    Ok(())
}
