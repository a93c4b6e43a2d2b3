use std::{sync::Arc, time::Duration};

use {
    courier_channels::UserId,
    courier_relay::Relay,
    secrecy::{ExposeSecret, Secret},
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, BotCommand, UpdateKind},
    },
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::handlers;

/// A bot that passed `getMe` and has its webhook cleared.
#[derive(Clone)]
pub struct ConnectedBot {
    pub bot: Bot,
    pub id: UserId,
    pub username: Option<String>,
}

/// Verify the token and prepare the bot for long polling.
pub async fn connect(token: &Secret<String>) -> anyhow::Result<ConnectedBot> {
    // Client timeout must outlast the long-polling timeout (30s).
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(45))
        .build()?;
    let bot = Bot::with_client(token.expose_secret(), client);

    let me = bot.get_me().await?;
    bot.delete_webhook().send().await?;

    let commands = vec![BotCommand::new("id", "Show this chat's id")];
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!("failed to register bot commands: {e}");
    }

    let id = UserId(i64::try_from(me.id.0)?);
    info!(username = ?me.username, bot_id = %id, "telegram bot connected (webhook cleared)");

    Ok(ConnectedBot {
        bot,
        id,
        username: me.username.clone(),
    })
}

/// Poll for updates and feed them to `relay` one at a time until `cancel`
/// fires. Each update is handled to completion before the next one.
pub fn spawn_polling(
    bot: Bot,
    group: ChatId,
    relay: Arc<Relay>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(group_id = group.0, "starting telegram polling loop");
        let mut offset: i32 = 0;

        loop {
            let result = tokio::select! {
                () = cancel.cancelled() => break,
                result = bot
                    .get_updates()
                    .offset(offset)
                    .timeout(30)
                    .allowed_updates(vec![AllowedUpdate::Message])
                    .send() => result,
            };

            match result {
                Ok(updates) => {
                    debug!(count = updates.len(), "got telegram updates");
                    for update in updates {
                        offset = update.id.as_offset();
                        match update.kind {
                            UpdateKind::Message(msg) => {
                                let chat_id = msg.chat.id.0;
                                if let Err(e) =
                                    handlers::handle_message(msg, &bot, group, &relay).await
                                {
                                    error!(chat_id, error = %e, "error handling telegram message");
                                }
                            },
                            other => {
                                debug!("ignoring non-message update: {other:?}");
                            },
                        }
                    }
                },
                Err(e) => {
                    if matches!(&e, RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) {
                        error!(
                            "telegram polling stopped: another instance is already running with this token"
                        );
                        cancel.cancel();
                        break;
                    }

                    warn!(error = %e, "telegram getUpdates failed");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(Duration::from_secs(5)) => {},
                    }
                },
            }
        }
        info!("telegram polling stopped");
    })
}
