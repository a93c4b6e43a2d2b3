use {
    courier_channels::Error as ChannelError,
    teloxide::{ApiError, RequestError},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Telegram(#[from] RequestError),

    #[error(transparent)]
    Relay(#[from] courier_relay::Error),

    #[error("message {message_id} in chat {chat_id} has no sender")]
    NoSender { chat_id: i64, message_id: i32 },
}

impl Error {
    #[must_use]
    pub fn no_sender(chat_id: i64, message_id: i32) -> Self {
        Self::NoSender {
            chat_id,
            message_id,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Map a Bot API failure onto the transport-neutral messaging error.
#[must_use]
pub fn to_channel_error(operation: &str, error: RequestError) -> ChannelError {
    match &error {
        RequestError::Api(
            ApiError::BotBlocked
            | ApiError::BotKicked
            | ApiError::UserDeactivated
            | ApiError::ChatNotFound,
        ) => ChannelError::rejected(format!("{operation}: {error}")),
        _ => ChannelError::external(operation.to_string(), error),
    }
}
