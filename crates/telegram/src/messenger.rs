//! [`Messenger`] over the Telegram Bot API.

use std::{future::Future, time::Duration};

use {
    async_trait::async_trait,
    courier_channels::{
        Destination, MessageHandle, Messenger, Result, SourceMessage, TextFormat, TopicHandle,
    },
    teloxide::{
        ApiError, RequestError,
        payloads::{CopyMessageSetters, SendMessageSetters},
        prelude::*,
        types::{ChatId, MessageId, ParseMode, ThreadId},
    },
    tracing::{debug, warn},
};

use crate::error::to_channel_error;

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Sends to end-users' private chats and to the operator group.
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    group: ChatId,
}

impl TelegramMessenger {
    pub fn new(bot: Bot, group: ChatId) -> Self {
        Self { bot, group }
    }

    fn target(&self, to: Destination) -> (ChatId, Option<ThreadId>) {
        match to {
            Destination::EndUser(user) => (ChatId(user.0), None),
            Destination::Operators { topic } => {
                (self.group, topic.map(|t| ThreadId(MessageId(t.0))))
            },
        }
    }

    async fn send_plain(
        &self,
        chat_id: ChatId,
        thread: Option<ThreadId>,
        text: &str,
    ) -> std::result::Result<MessageId, RequestError> {
        let message = run_with_retry(chat_id, "send message (plain)", || {
            let mut req = self.bot.send_message(chat_id, text);
            if let Some(thread) = thread {
                req = req.message_thread_id(thread);
            }
            async move { req.await }
        })
        .await?;
        Ok(message.id)
    }

    async fn send_html(
        &self,
        chat_id: ChatId,
        thread: Option<ThreadId>,
        text: &str,
    ) -> std::result::Result<MessageId, RequestError> {
        let html = run_with_retry(chat_id, "send message (html)", || {
            let mut req = self
                .bot
                .send_message(chat_id, text)
                .parse_mode(ParseMode::Html);
            if let Some(thread) = thread {
                req = req.message_thread_id(thread);
            }
            async move { req.await }
        })
        .await;
        match html {
            Ok(message) => Ok(message.id),
            // Other failures may have been delivered already, or would fail
            // again as plain text.
            Err(e) if !is_entity_parse_error(&e) => Err(e),
            Err(e) => {
                warn!(
                    chat_id = chat_id.0,
                    error = %e,
                    "telegram HTML send failed, retrying as plain text"
                );
                self.send_plain(chat_id, thread, text).await
            },
        }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(
        &self,
        to: Destination,
        text: &str,
        format: TextFormat,
    ) -> Result<MessageHandle> {
        let (chat_id, thread) = self.target(to);
        let sent = match format {
            TextFormat::Html => self.send_html(chat_id, thread, text).await,
            TextFormat::Plain => self.send_plain(chat_id, thread, text).await,
        };
        let id = sent.map_err(|e| to_channel_error("send message", e))?;
        debug!(chat_id = chat_id.0, message_id = id.0, "telegram message sent");
        Ok(MessageHandle(id.0))
    }

    async fn copy_message(
        &self,
        to: Destination,
        source: &SourceMessage,
    ) -> Result<MessageHandle> {
        let (chat_id, thread) = self.target(to);
        let from_chat = ChatId(source.chat_id);
        let message_id = MessageId(source.message_id.0);
        let copied = run_with_retry(chat_id, "copy message", || {
            let mut req = self.bot.copy_message(chat_id, from_chat, message_id);
            if let Some(thread) = thread {
                req = req.message_thread_id(thread);
            }
            async move { req.await }
        })
        .await
        .map_err(|e| to_channel_error("copy message", e))?;
        Ok(MessageHandle(copied.0))
    }

    async fn create_topic(&self, name: &str) -> Result<TopicHandle> {
        let topic = run_with_retry(self.group, "create forum topic", || {
            let req = self.bot.create_forum_topic(self.group, name);
            async move { req.await }
        })
        .await
        .map_err(|e| to_channel_error("create forum topic", e))?;
        let ThreadId(MessageId(id)) = topic.thread_id;
        Ok(TopicHandle(id))
    }
}

/// Run a Bot API request, sleeping through `RetryAfter` a bounded number of
/// times. Any other error is returned immediately.
async fn run_with_retry<T, F, Fut>(
    chat_id: ChatId,
    operation: &'static str,
    mut request: F,
) -> std::result::Result<T, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RequestError>>,
{
    let mut retries = 0usize;

    loop {
        match request().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let Some(wait) = retry_after_duration(&err) else {
                    return Err(err);
                };

                if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                    warn!(
                        chat_id = chat_id.0,
                        operation,
                        retries,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limit persisted after retries"
                    );
                    return Err(err);
                }

                retries += 1;
                warn!(
                    chat_id = chat_id.0,
                    operation,
                    retries,
                    retry_after_secs = wait.as_secs(),
                    "telegram rate limited, waiting before retry"
                );
                tokio::time::sleep(wait).await;
            },
        }
    }
}

/// Telegram rejected the HTML markup itself.
fn is_entity_parse_error(error: &RequestError) -> bool {
    match error {
        RequestError::Api(ApiError::CantParseEntities(_)) => true,
        RequestError::Api(api) => api.to_string().contains("can't parse entities"),
        _ => false,
    }
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}
