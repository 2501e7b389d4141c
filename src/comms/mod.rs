//! Comms — the external chat channels.
//!
//! Each channel (PTY, Telegram) implements [`runtime::Component`] and is
//! spawned as an independent task by [`start`]. Channels capture the shared
//! [`BotHandlers`] at construction; they never talk to the mediator directly.

#[cfg(feature = "channel-pty")]
pub mod pty;
pub mod runtime;
#[cfg(feature = "channel-telegram")]
pub mod telegram;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::AppError;
use crate::handlers::BotHandlers;
use runtime::{Component, ComponentsHandle, spawn_components};

/// Spawn all configured channels. Returns as soon as the tasks are spawned.
///
/// Fails when no channel would load, so the binary never sits idle.
pub fn start(
    config: &Config,
    handlers: Arc<BotHandlers>,
    shutdown: CancellationToken,
) -> Result<ComponentsHandle, AppError> {
    let mut components: Vec<Box<dyn Component>> = Vec::new();

    if config.comms_pty_should_load() {
        #[cfg(feature = "channel-pty")]
        {
            tracing::info!("loading pty channel");
            components.push(Box::new(pty::PtyChannel::new("pty0", config.bot_name.clone(), handlers.clone())));
        }
        #[cfg(not(feature = "channel-pty"))]
        tracing::warn!("pty channel enabled in config but built without `channel-pty`");
    }

    if config.comms_telegram_should_load() {
        #[cfg(feature = "channel-telegram")]
        {
            tracing::info!("loading telegram channel");
            components.push(Box::new(telegram::TelegramChannel::new("telegram0", handlers.clone())));
        }
        #[cfg(not(feature = "channel-telegram"))]
        tracing::warn!("telegram channel enabled in config but built without `channel-telegram`");
    }

    if components.is_empty() {
        return Err(AppError::Comms(
            "no comms channel enabled: run with -i or set [comms.telegram] enabled = true".into(),
        ));
    }

    drop(handlers);
    Ok(spawn_components(components, shutdown))
}
