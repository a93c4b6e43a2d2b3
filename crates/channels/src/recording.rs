//! In-memory messenger that records every call. No delivery; for tests and
//! dry runs only.

use std::{
    collections::HashSet,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicI32, Ordering},
    },
};

use async_trait::async_trait;

use crate::{
    Error, Result,
    message::{Destination, MessageHandle, SourceMessage, TextFormat, TopicHandle, UserId},
    messenger::Messenger,
};

/// A single recorded delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub to: Destination,
    pub handle: MessageHandle,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text { text: String, format: TextFormat },
    Copy { source: SourceMessage },
}

impl Delivery {
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text { text, .. } => Some(text),
            Payload::Copy { .. } => None,
        }
    }
}

/// Records sends, copies and topic creations; handles are allocated from a
/// counter.
pub struct RecordingMessenger {
    next_id: AtomicI32,
    deliveries: Mutex<Vec<Delivery>>,
    topics: Mutex<Vec<(TopicHandle, String)>>,
    fail_topics: AtomicBool,
    blocked_users: Mutex<HashSet<UserId>>,
    failing_texts: Mutex<HashSet<String>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI32::new(1000),
            deliveries: Mutex::new(Vec::new()),
            topics: Mutex::new(Vec::new()),
            fail_topics: AtomicBool::new(false),
            blocked_users: Mutex::new(HashSet::new()),
            failing_texts: Mutex::new(HashSet::new()),
        }
    }

    /// Make every subsequent `create_topic` call fail.
    pub fn fail_topic_creation(&self, fail: bool) {
        self.fail_topics.store(fail, Ordering::SeqCst);
    }

    /// Make deliveries to `user` fail, as if the user blocked the bot.
    pub fn block_user(&self, user: UserId) {
        self.blocked_users
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user);
    }

    /// Make text sends with exactly this body fail until
    /// [`Self::clear_failures`] is called.
    pub fn fail_text(&self, text: &str) {
        self.failing_texts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(text.to_string());
    }

    /// Undo [`Self::block_user`] and [`Self::fail_text`].
    pub fn clear_failures(&self) {
        self.blocked_users
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.failing_texts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Deliveries addressed to `to`, in send order.
    pub fn deliveries_to(&self, to: Destination) -> Vec<Delivery> {
        self.deliveries()
            .into_iter()
            .filter(|d| d.to == to)
            .collect()
    }

    /// Deliveries to the operator group, regardless of topic.
    pub fn operator_deliveries(&self) -> Vec<Delivery> {
        self.deliveries()
            .into_iter()
            .filter(|d| matches!(d.to, Destination::Operators { .. }))
            .collect()
    }

    pub fn topics(&self) -> Vec<(TopicHandle, String)> {
        self.topics.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn allocate(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn check_destination(&self, to: Destination) -> Result<()> {
        if let Destination::EndUser(user) = to {
            let blocked = self.blocked_users.lock().unwrap_or_else(|e| e.into_inner());
            if blocked.contains(&user) {
                return Err(Error::rejected(format!("bot was blocked by user {user}")));
            }
        }
        Ok(())
    }

    fn record(&self, to: Destination, payload: Payload) -> MessageHandle {
        let handle = MessageHandle(self.allocate());
        self.deliveries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Delivery {
                to,
                handle,
                payload,
            });
        handle
    }
}

impl Default for RecordingMessenger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(
        &self,
        to: Destination,
        text: &str,
        format: TextFormat,
    ) -> Result<MessageHandle> {
        self.check_destination(to)?;
        if self
            .failing_texts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(text)
        {
            return Err(Error::rejected("message could not be delivered"));
        }
        Ok(self.record(
            to,
            Payload::Text {
                text: text.to_string(),
                format,
            },
        ))
    }

    async fn copy_message(
        &self,
        to: Destination,
        source: &SourceMessage,
    ) -> Result<MessageHandle> {
        self.check_destination(to)?;
        Ok(self.record(to, Payload::Copy { source: *source }))
    }

    async fn create_topic(&self, name: &str) -> Result<TopicHandle> {
        // Behave like a network call: give concurrent callers a chance to run.
        tokio::task::yield_now().await;
        if self.fail_topics.load(Ordering::SeqCst) {
            return Err(Error::rejected("not enough rights to create a topic"));
        }
        let topic = TopicHandle(self.allocate());
        self.topics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((topic, name.to_string()));
        Ok(topic)
    }
}
