#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end conversations through the relay with in-memory transports.

use std::{sync::Arc, time::Duration};

use {
    courier_channels::{
        Attachment, AttachmentKind, Content, Destination, EndUser, InboundMessage, MessageHandle,
        OperatorMessage, SourceMessage, TopicHandle, UserId,
        recording::{Payload, RecordingMessenger},
    },
    courier_config::CrmWriteMode,
    courier_crm::{
        CrmCache, CrmMirror, InMemoryCrm, LeadBinder, LeadId, MirrorChannel, PollSynchronizer,
        PrefixSelfAuthored,
    },
    courier_relay::{OperatorOutcome, Relay, RelayOptions, RouteMiss},
    courier_store::{InMemoryLinkStore, LinkStore},
};

const CLIENT: UserId = UserId(7);
const OPERATOR: UserId = UserId(1);
const GROUP: i64 = -100_123;

struct Harness {
    store: Arc<InMemoryLinkStore>,
    messenger: Arc<RecordingMessenger>,
    crm: Arc<InMemoryCrm>,
    relay: Relay,
    sync: PollSynchronizer,
    next_message: i32,
}

impl Harness {
    fn new(mode: CrmWriteMode) -> Self {
        let store = Arc::new(InMemoryLinkStore::new());
        let messenger = Arc::new(RecordingMessenger::new());
        let crm = Arc::new(InMemoryCrm::new());
        let binder = Arc::new(LeadBinder::new(
            crm.clone(),
            store.clone(),
            Arc::new(CrmCache::new()),
            None,
        ));
        let mirror = Arc::new(CrmMirror::new(crm.clone(), binder, mode));
        let relay = Relay::new(store.clone(), messenger.clone(), RelayOptions {
            bot_id: Some(UserId(999)),
            ..RelayOptions::default()
        })
        .with_mirror(mirror);
        let sync = PollSynchronizer::new(
            crm.clone(),
            store.clone(),
            messenger.clone(),
            Arc::new(PrefixSelfAuthored::default()),
            Duration::from_secs(15),
        );
        Self {
            store,
            messenger,
            crm,
            relay,
            sync,
            next_message: 1,
        }
    }

    fn source(&mut self, chat_id: i64) -> SourceMessage {
        self.next_message += 1;
        SourceMessage {
            chat_id,
            message_id: MessageHandle(self.next_message),
        }
    }

    fn client_says(&mut self, content: Content) -> InboundMessage {
        InboundMessage {
            from: EndUser {
                id: CLIENT,
                display_name: "Ann".into(),
                username: Some("ann".into()),
            },
            source: self.source(CLIENT.0),
            content,
        }
    }

    fn operator_says(
        &mut self,
        topic: Option<TopicHandle>,
        reply_to: Option<MessageHandle>,
        text: &str,
    ) -> OperatorMessage {
        OperatorMessage {
            author: Some(OPERATOR),
            source: self.source(GROUP),
            topic,
            reply_to,
            content: Content::Text(text.into()),
        }
    }

    fn client_inbox(&self) -> Vec<Payload> {
        self.messenger
            .deliveries_to(Destination::EndUser(CLIENT))
            .into_iter()
            .map(|d| d.payload)
            .collect()
    }

    async fn lead(&self) -> LeadId {
        self.store.lead_for_user(CLIENT).await.unwrap().unwrap()
    }
}

fn text(s: &str) -> Content {
    Content::Text(s.into())
}

fn plain(s: &str) -> Payload {
    Payload::Text {
        text: s.into(),
        format: courier_channels::TextFormat::Plain,
    }
}

#[tokio::test]
async fn first_message_opens_topic_and_lead() {
    let mut h = Harness::new(CrmWriteMode::CommentOnly);
    let msg = h.client_says(text("Hello"));

    let report = h.relay.handle_inbound(&msg).await;

    let delivery = report.delivery.unwrap();
    let topic = delivery.topic.unwrap();
    assert_eq!(h.messenger.topics(), vec![(topic, "Ann (@ann)".to_string())]);

    let posted = h.messenger.deliveries_to(Destination::operators(Some(topic)));
    assert_eq!(posted.len(), 1);
    let body = posted[0].text().unwrap();
    assert!(body.contains("<b>Username</b>: @ann"));
    assert!(body.ends_with("\nHello"));

    let receipt = report.mirror.unwrap().unwrap();
    assert_eq!(receipt.channel, MirrorChannel::Comment);
    assert_eq!(receipt.lead, h.lead().await);
    let comments = h.crm.comments(receipt.lead);
    assert!(comments[0].text.as_deref().unwrap().contains("Hello"));
}

#[tokio::test]
async fn quoted_operator_reply_reaches_client() {
    let mut h = Harness::new(CrmWriteMode::CommentOnly);
    let msg = h.client_says(text("Hello"));
    let delivery = h.relay.handle_inbound(&msg).await.delivery.unwrap();

    let reply = h.operator_says(delivery.topic, Some(delivery.linked), "Hi there");
    let outcome = h.relay.handle_operator(&reply).await.unwrap();

    assert_eq!(outcome, OperatorOutcome::Delivered(CLIENT));
    assert_eq!(h.client_inbox(), vec![plain("Hi there")]);
}

#[tokio::test]
async fn unquoted_operator_message_only_warns() {
    let mut h = Harness::new(CrmWriteMode::CommentOnly);
    let msg = h.client_says(text("Hello"));
    let delivery = h.relay.handle_inbound(&msg).await.delivery.unwrap();

    let stray = h.operator_says(delivery.topic, None, "Hi there");
    let outcome = h.relay.handle_operator(&stray).await.unwrap();

    assert_eq!(outcome, OperatorOutcome::Warned(RouteMiss::NotAReply));
    assert!(h.client_inbox().is_empty());
    let in_topic = h.messenger.deliveries_to(Destination::operators(delivery.topic));
    assert_eq!(in_topic.len(), 2);
    assert!(in_topic[1].text().unwrap().starts_with("⚠️"));
}

#[tokio::test]
async fn crm_comment_reaches_client_on_next_poll() {
    let mut h = Harness::new(CrmWriteMode::CommentOnly);
    let msg = h.client_says(text("Hello"));
    h.relay.handle_inbound(&msg).await;
    let lead = h.lead().await;

    h.store.set_comment_watermark(lead, 40).await.unwrap();
    h.crm.push_comment(lead, 42, Some("Hi from CRM"));
    h.sync.run_cycle().await.unwrap();

    assert_eq!(h.client_inbox(), vec![plain("Hi from CRM")]);
    assert_eq!(h.store.comment_watermark(lead).await.unwrap(), Some(42));
}

#[tokio::test]
async fn mirrored_comments_do_not_echo_back() {
    let mut h = Harness::new(CrmWriteMode::CommentOnly);
    for body in ["one", "two"] {
        let msg = h.client_says(text(body));
        h.relay.handle_inbound(&msg).await;
    }
    let lead = h.lead().await;
    assert_eq!(h.crm.comments(lead).len(), 2);

    let report = h.sync.run_cycle().await.unwrap();

    assert_eq!(report.comments_relayed, 0);
    assert!(h.client_inbox().is_empty());
    assert_eq!(h.store.comment_watermark(lead).await.unwrap(), Some(2));
}

#[tokio::test]
async fn client_messages_keep_their_order() {
    let mut h = Harness::new(CrmWriteMode::DualChannel);
    let bodies = ["first", "second", "third"];
    for body in bodies {
        let msg = h.client_says(text(body));
        h.relay.handle_inbound(&msg).await.delivery.unwrap();
    }
    let photo = h.client_says(Content::Attachment(Attachment {
        kind: AttachmentKind::Photo,
        caption: None,
    }));
    h.relay.handle_inbound(&photo).await.delivery.unwrap();

    let posted = h.messenger.operator_deliveries();
    let texts: Vec<_> = posted[..3].iter().map(|d| d.text().unwrap()).collect();
    for (text, body) in texts.iter().zip(bodies) {
        assert!(text.ends_with(body), "{text} should end with {body}");
    }
    assert_eq!(posted[3].payload, Payload::Copy {
        source: photo.source
    });

    let chat = h.crm.chat(h.lead().await);
    let mirrored: Vec<_> = chat.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(mirrored, vec!["first", "second", "third", "[attachment: photo]"]);
}

#[tokio::test]
async fn crm_outage_is_annotated_in_topic() {
    let mut h = Harness::new(CrmWriteMode::CommentOnly);
    h.crm.set_lead_creation_fails(true);
    let msg = h.client_says(text("Hello"));

    let report = h.relay.handle_inbound(&msg).await;

    let delivery = report.delivery.unwrap();
    assert!(report.mirror.unwrap().is_err());
    let in_topic = h.messenger.deliveries_to(Destination::operators(delivery.topic));
    assert_eq!(in_topic.len(), 2);
    assert!(in_topic[1].text().unwrap().starts_with("⚠️ CRM"));
    assert_eq!(h.store.lead_for_user(CLIENT).await.unwrap(), None);
}

#[tokio::test]
async fn concurrent_first_messages_converge_on_one_topic() {
    let mut h = Harness::new(CrmWriteMode::CommentOnly);
    let a = h.client_says(text("a"));
    let b = h.client_says(text("b"));

    let (ra, rb) = tokio::join!(h.relay.handle_inbound(&a), h.relay.handle_inbound(&b));
    let (ta, tb) = (ra.delivery.unwrap().topic, rb.delivery.unwrap().topic);

    assert_ne!(ta, tb);
    assert_eq!(h.messenger.topics().len(), 2);
    let bound = h.store.topic_for_user(CLIENT).await.unwrap();
    assert!(bound == ta || bound == tb);

    let c = h.client_says(text("c"));
    let rc = h.relay.handle_inbound(&c).await;
    assert_eq!(rc.delivery.unwrap().topic, bound);
    assert_eq!(h.messenger.topics().len(), 2);
}
