//! Operators → client.
//!
//! A reply is routed by the message it quotes: only quoting a message that
//! the client relay linked reaches a client.

use std::sync::Arc;

use {
    courier_channels::{
        Content, Destination, MessageHandle, Messenger, OperatorMessage, TextFormat, UserId,
    },
    courier_store::LinkStore,
    tracing::{debug, warn},
};

use crate::{
    Result,
    header::{NOT_A_REPLY_WARNING, UNKNOWN_TARGET_WARNING, delivery_failure_warning},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Posted by the bot itself.
    OwnMessage,
    /// A `/command`, handled elsewhere.
    Command,
}

/// Why an operator message could not be routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMiss {
    NotAReply,
    /// The quoted message has no conversation link.
    UnknownTarget(MessageHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorOutcome {
    Ignored(IgnoreReason),
    /// Operators were told how to reply; nothing reached a client.
    Warned(RouteMiss),
    Delivered(UserId),
}

pub struct OperatorRelay {
    store: Arc<dyn LinkStore>,
    messenger: Arc<dyn Messenger>,
    bot_id: Option<UserId>,
}

impl OperatorRelay {
    pub fn new(
        store: Arc<dyn LinkStore>,
        messenger: Arc<dyn Messenger>,
        bot_id: Option<UserId>,
    ) -> Self {
        Self {
            store,
            messenger,
            bot_id,
        }
    }

    pub async fn handle(&self, msg: &OperatorMessage) -> Result<OperatorOutcome> {
        if self.bot_id.is_some() && msg.author == self.bot_id {
            return Ok(OperatorOutcome::Ignored(IgnoreReason::OwnMessage));
        }
        if msg.is_command() {
            return Ok(OperatorOutcome::Ignored(IgnoreReason::Command));
        }

        let Some(target) = msg.reply_to else {
            return self.route_miss(msg, RouteMiss::NotAReply).await;
        };
        let Some(user) = self.store.user_for_link(target).await? else {
            return self.route_miss(msg, RouteMiss::UnknownTarget(target)).await;
        };

        let to = Destination::EndUser(user);
        let sent = match &msg.content {
            Content::Text(text) => self.messenger.send_text(to, text, TextFormat::Plain).await,
            Content::Attachment(_) => self.messenger.copy_message(to, &msg.source).await,
        };
        if let Err(e) = sent {
            warn!(user_id = %user, error = %e, "could not deliver operator reply");
            let note = delivery_failure_warning(user, &e);
            if let Err(warn_err) = self
                .messenger
                .send_text(Destination::operators(msg.topic), &note, TextFormat::Html)
                .await
            {
                warn!(error = %warn_err, "could not post delivery warning");
            }
            return Err(e.into());
        }

        debug!(user_id = %user, replied_to = %target, "operator reply delivered");
        Ok(OperatorOutcome::Delivered(user))
    }

    async fn route_miss(&self, msg: &OperatorMessage, miss: RouteMiss) -> Result<OperatorOutcome> {
        let text = match miss {
            RouteMiss::NotAReply => NOT_A_REPLY_WARNING,
            RouteMiss::UnknownTarget(_) => UNKNOWN_TARGET_WARNING,
        };
        debug!(?miss, topic = ?msg.topic, "operator message not routed");
        self.messenger
            .send_text(Destination::operators(msg.topic), text, TextFormat::Html)
            .await?;
        Ok(OperatorOutcome::Warned(miss))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        courier_channels::{
            Attachment, AttachmentKind, SourceMessage, TopicHandle,
            recording::{Payload, RecordingMessenger},
        },
        courier_store::InMemoryLinkStore,
        rstest::rstest,
    };

    const BOT: UserId = UserId(999);
    const CLIENT: UserId = UserId(7);
    const LINKED: MessageHandle = MessageHandle(50);
    const TOPIC: TopicHandle = TopicHandle(3);

    async fn fixture() -> (Arc<RecordingMessenger>, OperatorRelay) {
        let store = Arc::new(InMemoryLinkStore::new());
        store.save_link(LINKED, CLIENT).await.unwrap();
        let messenger = Arc::new(RecordingMessenger::new());
        let relay = OperatorRelay::new(store, messenger.clone(), Some(BOT));
        (messenger, relay)
    }

    fn operator_message(
        author: UserId,
        reply_to: Option<MessageHandle>,
        content: Content,
    ) -> OperatorMessage {
        OperatorMessage {
            author: Some(author),
            source: SourceMessage {
                chat_id: -100,
                message_id: MessageHandle(60),
            },
            topic: Some(TOPIC),
            reply_to,
            content,
        }
    }

    fn text(s: &str) -> Content {
        Content::Text(s.into())
    }

    #[tokio::test]
    async fn quoted_text_reaches_client_verbatim() {
        let (messenger, relay) = fixture().await;
        let outcome = relay
            .handle(&operator_message(UserId(1), Some(LINKED), text("Hi there")))
            .await
            .unwrap();

        assert_eq!(outcome, OperatorOutcome::Delivered(CLIENT));
        let sent = messenger.deliveries_to(Destination::EndUser(CLIENT));
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload, Payload::Text {
            text: "Hi there".into(),
            format: TextFormat::Plain,
        });
    }

    #[tokio::test]
    async fn quoted_attachment_is_copied() {
        let (messenger, relay) = fixture().await;
        let msg = operator_message(
            UserId(1),
            Some(LINKED),
            Content::Attachment(Attachment {
                kind: AttachmentKind::Document,
                caption: None,
            }),
        );
        relay.handle(&msg).await.unwrap();

        let sent = messenger.deliveries_to(Destination::EndUser(CLIENT));
        assert_eq!(sent[0].payload, Payload::Copy { source: msg.source });
    }

    #[rstest]
    #[case(None, RouteMiss::NotAReply)]
    #[case(Some(MessageHandle(51)), RouteMiss::UnknownTarget(MessageHandle(51)))]
    #[tokio::test]
    async fn unroutable_messages_warn_in_same_topic(
        #[case] reply_to: Option<MessageHandle>,
        #[case] miss: RouteMiss,
    ) {
        let (messenger, relay) = fixture().await;
        let outcome = relay
            .handle(&operator_message(UserId(1), reply_to, text("Hi")))
            .await
            .unwrap();

        assert_eq!(outcome, OperatorOutcome::Warned(miss));
        assert!(messenger.deliveries_to(Destination::EndUser(CLIENT)).is_empty());
        let warnings = messenger.deliveries_to(Destination::operators(Some(TOPIC)));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].text().unwrap().starts_with("⚠️"));
    }

    #[rstest]
    #[case(BOT, "anything", IgnoreReason::OwnMessage)]
    #[case(UserId(1), "/id", IgnoreReason::Command)]
    #[tokio::test]
    async fn ignored_messages_produce_nothing(
        #[case] author: UserId,
        #[case] body: &str,
        #[case] reason: IgnoreReason,
    ) {
        let (messenger, relay) = fixture().await;
        let outcome = relay
            .handle(&operator_message(author, Some(LINKED), text(body)))
            .await
            .unwrap();

        assert_eq!(outcome, OperatorOutcome::Ignored(reason));
        assert!(messenger.deliveries().is_empty());
    }

    #[tokio::test]
    async fn failed_delivery_is_reported_to_operators() {
        let (messenger, relay) = fixture().await;
        messenger.block_user(CLIENT);

        let result = relay
            .handle(&operator_message(UserId(1), Some(LINKED), text("Hi")))
            .await;

        assert!(result.is_err());
        let warnings = messenger.deliveries_to(Destination::operators(Some(TOPIC)));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].text().unwrap().contains("<code>7</code>"));
    }
}
