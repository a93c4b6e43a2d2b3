//! Turning Telegram updates into relay events.

use {
    courier_channels::{
        Attachment, AttachmentKind, Content, EndUser, InboundMessage, MessageHandle,
        OperatorMessage, SourceMessage, TopicHandle, UserId,
    },
    courier_relay::Relay,
    teloxide::{
        payloads::SendMessageSetters,
        prelude::*,
        types::{MediaKind, MessageKind, ParseMode, ReplyParameters, User},
    },
    tracing::{debug, info},
};

use crate::{Error, Result};

/// What a single incoming message means for the relay.
#[derive(Debug)]
pub enum Route {
    /// `/id`, answered in any chat.
    ChatId,
    Client(InboundMessage),
    Operators(OperatorMessage),
    Ignore(&'static str),
}

/// Classify `msg`, received by a bot serving the operator group `group`.
pub fn route(msg: &Message, group: ChatId) -> Result<Route> {
    if is_id_command(msg) {
        return Ok(Route::ChatId);
    }

    if msg.chat.is_private() {
        let Some(content) = content(msg) else {
            return Ok(Route::Ignore("service message"));
        };
        let user = msg
            .from
            .as_ref()
            .ok_or_else(|| Error::no_sender(msg.chat.id.0, msg.id.0))?;
        return Ok(Route::Client(InboundMessage {
            from: end_user(user),
            source: source(msg),
            content,
        }));
    }

    if msg.chat.id != group {
        return Ok(Route::Ignore("foreign chat"));
    }
    let Some(content) = content(msg) else {
        return Ok(Route::Ignore("service message"));
    };
    Ok(Route::Operators(OperatorMessage {
        author: msg.from.as_ref().and_then(user_id),
        source: source(msg),
        topic: topic(msg),
        reply_to: explicit_reply(msg),
        content,
    }))
}

pub async fn handle_message(msg: Message, bot: &Bot, group: ChatId, relay: &Relay) -> Result<()> {
    match route(&msg, group)? {
        Route::ChatId => {
            info!(chat_id = msg.chat.id.0, "answering /id");
            let mut req = bot
                .send_message(msg.chat.id, format!("chat_id = <code>{}</code>", msg.chat.id.0))
                .parse_mode(ParseMode::Html)
                .reply_parameters(ReplyParameters::new(msg.id).allow_sending_without_reply());
            if let Some(thread) = msg.thread_id.filter(|_| msg.is_topic_message) {
                req = req.message_thread_id(thread);
            }
            req.await?;
        },
        Route::Client(inbound) => {
            debug!(user_id = %inbound.from.id, "client message");
            // Failures are logged and annotated by the relay itself.
            relay.handle_inbound(&inbound).await;
        },
        Route::Operators(operator) => {
            debug!(message_id = %operator.source.message_id, "operator message");
            let outcome = relay.handle_operator(&operator).await?;
            debug!(?outcome, "operator message handled");
        },
        Route::Ignore(reason) => {
            debug!(chat_id = msg.chat.id.0, reason, "ignoring telegram message");
        },
    }
    Ok(())
}

fn is_id_command(msg: &Message) -> bool {
    msg.text().is_some_and(|text| {
        let command = text.split_whitespace().next().unwrap_or_default();
        command == "/id" || command.starts_with("/id@")
    })
}

fn user_id(user: &User) -> Option<UserId> {
    i64::try_from(user.id.0).ok().map(UserId)
}

fn end_user(user: &User) -> EndUser {
    EndUser {
        id: user_id(user).unwrap_or(UserId(0)),
        display_name: user.full_name(),
        username: user.username.clone(),
    }
}

fn source(msg: &Message) -> SourceMessage {
    SourceMessage {
        chat_id: msg.chat.id.0,
        message_id: MessageHandle(msg.id.0),
    }
}

fn topic(msg: &Message) -> Option<TopicHandle> {
    msg.thread_id
        .filter(|_| msg.is_topic_message)
        .map(|thread| TopicHandle(thread.0.0))
}

/// The message being quoted, if the operator actually quoted one.
///
/// Inside a forum topic Telegram reports every message as a reply to the
/// topic's opening service message; that is not a quote.
fn explicit_reply(msg: &Message) -> Option<MessageHandle> {
    let replied = msg.reply_to_message()?;
    if let Some(thread) = msg.thread_id
        && msg.is_topic_message
        && replied.id == thread.0
    {
        return None;
    }
    Some(MessageHandle(replied.id.0))
}

fn content(msg: &Message) -> Option<Content> {
    let MessageKind::Common(common) = &msg.kind else {
        return None;
    };
    let (kind, caption) = match &common.media_kind {
        MediaKind::Text(t) => return Some(Content::Text(t.text.clone())),
        MediaKind::Photo(p) => (AttachmentKind::Photo, p.caption.clone()),
        MediaKind::Video(v) => (AttachmentKind::Video, v.caption.clone()),
        MediaKind::Animation(a) => (AttachmentKind::Animation, a.caption.clone()),
        MediaKind::Audio(a) => (AttachmentKind::Audio, a.caption.clone()),
        MediaKind::Voice(v) => (AttachmentKind::Voice, v.caption.clone()),
        MediaKind::Document(d) => (AttachmentKind::Document, d.caption.clone()),
        MediaKind::VideoNote(_) => (AttachmentKind::VideoNote, None),
        MediaKind::Sticker(_) => (AttachmentKind::Sticker, None),
        MediaKind::Location(_) | MediaKind::Venue(_) => (AttachmentKind::Location, None),
        MediaKind::Contact(_) => (AttachmentKind::Contact, None),
        _ => (AttachmentKind::Other, None),
    };
    Some(Content::Attachment(Attachment { kind, caption }))
}
