//! The relay as seen by a transport: one entry point per event kind.

use std::sync::Arc;

use {
    courier_channels::{
        Destination, InboundMessage, Messenger, OperatorMessage, TextFormat, TopicHandle, UserId,
    },
    courier_config::TelegramConfig,
    courier_crm::{CrmMirror, MirrorReceipt},
    courier_store::LinkStore,
    tracing::{debug, error, warn},
};

use crate::{
    ErrorClass, Result,
    client::{ClientDelivery, ClientRelay},
    header::crm_failure_warning,
    operator::{OperatorOutcome, OperatorRelay},
    topics::TopicResolver,
};

/// Operator-group behaviour of the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOptions {
    pub use_topics: bool,
    pub topic_name_max_len: usize,
    /// The bot's own account; its messages in the group are ignored.
    pub bot_id: Option<UserId>,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            use_topics: true,
            topic_name_max_len: 128,
            bot_id: None,
        }
    }
}

impl RelayOptions {
    pub fn from_config(config: &TelegramConfig, bot_id: Option<UserId>) -> Self {
        Self {
            use_topics: config.use_topics,
            topic_name_max_len: config.topic_name_max_len,
            bot_id,
        }
    }
}

/// Result of handling one client message.
#[derive(Debug)]
pub struct InboundReport {
    pub delivery: Result<ClientDelivery>,
    /// `None` when no CRM is configured.
    pub mirror: Option<courier_crm::Result<MirrorReceipt>>,
}

pub struct Relay {
    store: Arc<dyn LinkStore>,
    messenger: Arc<dyn Messenger>,
    client: ClientRelay,
    operator: OperatorRelay,
    mirror: Option<Arc<CrmMirror>>,
}

impl Relay {
    pub fn new(
        store: Arc<dyn LinkStore>,
        messenger: Arc<dyn Messenger>,
        options: RelayOptions,
    ) -> Self {
        let topics = options.use_topics.then(|| {
            TopicResolver::new(
                Arc::clone(&store),
                Arc::clone(&messenger),
                options.topic_name_max_len,
            )
        });
        Self {
            client: ClientRelay::new(Arc::clone(&store), Arc::clone(&messenger), topics),
            operator: OperatorRelay::new(
                Arc::clone(&store),
                Arc::clone(&messenger),
                options.bot_id,
            ),
            store,
            messenger,
            mirror: None,
        }
    }

    /// Mirror every client message into the CRM.
    #[must_use]
    pub fn with_mirror(mut self, mirror: Arc<CrmMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Relay a client message to the operators and, concurrently, into the
    /// CRM. Both finish before this returns, so callers handling events one
    /// at a time keep per-client order.
    ///
    /// A CRM failure never fails the relay; it is logged and shown to the
    /// operators next to the client's message.
    pub async fn handle_inbound(&self, msg: &InboundMessage) -> InboundReport {
        let (delivery, mirror) = tokio::join!(self.client.relay(msg), self.mirror(msg));

        if let Some(Err(e)) = &mirror {
            let topic = match &delivery {
                Ok(d) => d.topic,
                Err(_) => self.known_topic(msg.from.id).await,
            };
            self.report_mirror_failure(msg, topic, e).await;
        }
        if let Err(e) = &delivery {
            error!(user_id = %msg.from.id, error = %e, "failed to relay client message");
        }

        InboundReport { delivery, mirror }
    }

    pub async fn handle_operator(&self, msg: &OperatorMessage) -> Result<OperatorOutcome> {
        let outcome = self.operator.handle(msg).await;
        if let Err(e) = &outcome {
            warn!(
                message_id = %msg.source.message_id,
                error = %e,
                "failed to relay operator message"
            );
        }
        outcome
    }

    async fn mirror(&self, msg: &InboundMessage) -> Option<courier_crm::Result<MirrorReceipt>> {
        let mirror = self.mirror.as_ref()?;
        let receipt = mirror.mirror(msg).await;
        if let Ok(r) = &receipt {
            debug!(user_id = %msg.from.id, lead_id = %r.lead, channel = ?r.channel, "client message mirrored");
        }
        Some(receipt)
    }

    async fn known_topic(&self, user: UserId) -> Option<TopicHandle> {
        self.store.topic_for_user(user).await.ok().flatten()
    }

    async fn report_mirror_failure(
        &self,
        msg: &InboundMessage,
        topic: Option<TopicHandle>,
        e: &courier_crm::Error,
    ) {
        match e.class() {
            ErrorClass::Authorization | ErrorClass::Storage => {
                error!(user_id = %msg.from.id, error = %e, class = ?e.class(), "crm mirror failed");
            },
            ErrorClass::Transport => {
                warn!(user_id = %msg.from.id, error = %e, "crm mirror failed");
            },
        }
        let note = crm_failure_warning(&msg.from, e);
        if let Err(e) = self
            .messenger
            .send_text(Destination::operators(topic), &note, TextFormat::Html)
            .await
        {
            warn!(user_id = %msg.from.id, error = %e, "could not post crm warning");
        }
    }
}
