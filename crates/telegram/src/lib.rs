//! Telegram transport for courier.
//!
//! Receives updates by long polling with teloxide and implements
//! [`courier_channels::Messenger`] on top of the Bot API. Private chats are
//! clients; the configured supergroup (optionally with forum topics) is where
//! operators work.

pub mod bot;
pub mod error;
pub mod handlers;
pub mod messenger;

pub use {
    bot::{ConnectedBot, connect, spawn_polling},
    error::{Error, Result},
    messenger::TelegramMessenger,
};
