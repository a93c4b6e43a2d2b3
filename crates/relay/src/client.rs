//! Client → operators.

use std::sync::Arc;

use {
    courier_channels::{
        Content, Destination, EndUser, InboundMessage, MessageHandle, Messenger, TextFormat,
        TopicHandle,
    },
    courier_store::LinkStore,
    tracing::{debug, warn},
};

use crate::{
    Result,
    header::{attachment_note, text_message, topic_fallback_warning},
    topics::TopicResolver,
};

/// Where a client message landed in the operator group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientDelivery {
    /// `None` when posted in the general area.
    pub topic: Option<TopicHandle>,
    /// The operator-group message that replies must target.
    pub linked: MessageHandle,
}

pub struct ClientRelay {
    store: Arc<dyn LinkStore>,
    messenger: Arc<dyn Messenger>,
    topics: Option<TopicResolver>,
}

impl ClientRelay {
    /// `topics` is `None` when every client shares the general area.
    pub fn new(
        store: Arc<dyn LinkStore>,
        messenger: Arc<dyn Messenger>,
        topics: Option<TopicResolver>,
    ) -> Self {
        Self {
            store,
            messenger,
            topics,
        }
    }

    /// Post `msg` for the operators and link the posted message to its sender.
    ///
    /// Text goes out as header plus body in one message. Attachments are
    /// copied, linked, then followed by an unlinked header note.
    pub async fn relay(&self, msg: &InboundMessage) -> Result<ClientDelivery> {
        let user = msg.from.id;
        let topic = self.resolve_topic(&msg.from).await;
        let to = Destination::operators(topic);

        let linked = match &msg.content {
            Content::Text(text) => {
                let body = text_message(&msg.from, text);
                let handle = self.messenger.send_text(to, &body, TextFormat::Html).await?;
                self.store.save_link(handle, user).await?;
                handle
            },
            Content::Attachment(attachment) => {
                let handle = self.messenger.copy_message(to, &msg.source).await?;
                self.store.save_link(handle, user).await?;
                self.messenger
                    .send_text(to, &attachment_note(&msg.from), TextFormat::Html)
                    .await?;
                debug!(user_id = %user, kind = attachment.kind.as_str(), "copied client attachment");
                handle
            },
        };

        debug!(user_id = %user, message_id = %linked, "client message relayed");
        Ok(ClientDelivery { topic, linked })
    }

    /// Best effort: on failure, operators are told in the general area and
    /// the message goes there too.
    async fn resolve_topic(&self, user: &EndUser) -> Option<TopicHandle> {
        let resolver = self.topics.as_ref()?;
        match resolver.ensure_topic(user).await {
            Ok(topic) => Some(topic),
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "could not open operator topic");
                if let Err(e) = self
                    .messenger
                    .send_text(
                        Destination::operators(None),
                        &topic_fallback_warning(user),
                        TextFormat::Html,
                    )
                    .await
                {
                    warn!(user_id = %user.id, error = %e, "could not post topic warning");
                }
                None
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        courier_channels::{
            Attachment, AttachmentKind, SourceMessage, UserId,
            recording::{Payload, RecordingMessenger},
        },
        courier_store::InMemoryLinkStore,
    };

    struct Fixture {
        store: Arc<InMemoryLinkStore>,
        messenger: Arc<RecordingMessenger>,
        relay: ClientRelay,
    }

    fn fixture(use_topics: bool) -> Fixture {
        let store = Arc::new(InMemoryLinkStore::new());
        let messenger = Arc::new(RecordingMessenger::new());
        let topics =
            use_topics.then(|| TopicResolver::new(store.clone(), messenger.clone(), 128));
        let relay = ClientRelay::new(store.clone(), messenger.clone(), topics);
        Fixture {
            store,
            messenger,
            relay,
        }
    }

    fn inbound(content: Content) -> InboundMessage {
        InboundMessage {
            from: EndUser {
                id: UserId(7),
                display_name: "Ann".into(),
                username: None,
            },
            source: SourceMessage {
                chat_id: 7,
                message_id: MessageHandle(11),
            },
            content,
        }
    }

    #[tokio::test]
    async fn text_is_sent_with_header_and_linked() {
        let f = fixture(true);
        let delivery = f
            .relay
            .relay(&inbound(Content::Text("Hello".into())))
            .await
            .unwrap();

        let sent = f.messenger.operator_deliveries();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, Destination::operators(delivery.topic));
        assert!(delivery.topic.is_some());
        let text = sent[0].text().unwrap();
        assert!(text.starts_with("👤 <b>Client</b>: Ann"));
        assert!(text.ends_with("\nHello"));
        assert_eq!(
            f.store.user_for_link(delivery.linked).await.unwrap(),
            Some(UserId(7))
        );
    }

    #[tokio::test]
    async fn attachment_is_copied_then_annotated() {
        let f = fixture(false);
        let delivery = f
            .relay
            .relay(&inbound(Content::Attachment(Attachment {
                kind: AttachmentKind::Photo,
                caption: None,
            })))
            .await
            .unwrap();

        let sent = f.messenger.operator_deliveries();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].payload, Payload::Copy {
            source: SourceMessage {
                chat_id: 7,
                message_id: MessageHandle(11),
            }
        });
        assert_eq!(sent[0].handle, delivery.linked);
        assert!(sent[1].text().unwrap().contains("attachment"));
        assert_eq!(
            f.store.user_for_link(sent[1].handle).await.unwrap(),
            None
        );
        assert_eq!(delivery.topic, None);
    }

    #[tokio::test]
    async fn topic_failure_falls_back_to_general_area_with_warning() {
        let f = fixture(true);
        f.messenger.fail_topic_creation(true);

        let delivery = f
            .relay
            .relay(&inbound(Content::Text("Hello".into())))
            .await
            .unwrap();

        assert_eq!(delivery.topic, None);
        let sent = f.messenger.operator_deliveries();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|d| d.to == Destination::operators(None)));
        assert!(sent[0].text().unwrap().starts_with("⚠️ Could not open a topic"));
        assert_eq!(sent[1].handle, delivery.linked);
    }
}
