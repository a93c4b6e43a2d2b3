//! Messaging plane shared by the relay engine and its transports.
//!
//! The relay never talks to Telegram directly: it addresses end-users and the
//! operator group through the [`Messenger`] trait and receives events already
//! translated into [`InboundMessage`] / [`OperatorMessage`].

pub mod error;
pub mod message;
pub mod messenger;
pub mod recording;

pub use {
    error::{Error, Result},
    message::{
        Attachment, AttachmentKind, Content, Destination, EndUser, InboundMessage, MessageHandle,
        OperatorMessage, SourceMessage, TextFormat, TopicHandle, UserId,
    },
    messenger::Messenger,
};
