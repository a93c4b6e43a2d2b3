//! In-memory store for tests and ephemeral runs.

use std::{collections::HashMap, sync::Mutex};

use {
    async_trait::async_trait,
    courier_channels::{MessageHandle, TopicHandle, UserId},
};

use crate::{
    Result,
    store::{LeadBinding, LeadId, LinkStore},
};

#[derive(Default)]
struct Tables {
    links: HashMap<MessageHandle, UserId>,
    topics: HashMap<UserId, TopicHandle>,
    leads: HashMap<UserId, LeadId>,
    comment_watermarks: HashMap<LeadId, i64>,
    chat_watermarks: HashMap<LeadId, i64>,
}

/// In-memory store backed by `HashMap`s. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryLinkStore {
    tables: Mutex<Tables>,
}

impl InMemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut tables)
    }
}

#[async_trait]
impl LinkStore for InMemoryLinkStore {
    async fn save_link(&self, message: MessageHandle, user: UserId) -> Result<()> {
        self.with(|t| t.links.insert(message, user));
        Ok(())
    }

    async fn user_for_link(&self, message: MessageHandle) -> Result<Option<UserId>> {
        Ok(self.with(|t| t.links.get(&message).copied()))
    }

    async fn save_topic(&self, user: UserId, topic: TopicHandle) -> Result<()> {
        self.with(|t| t.topics.insert(user, topic));
        Ok(())
    }

    async fn topic_for_user(&self, user: UserId) -> Result<Option<TopicHandle>> {
        Ok(self.with(|t| t.topics.get(&user).copied()))
    }

    async fn save_lead(&self, user: UserId, lead: LeadId) -> Result<()> {
        self.with(|t| t.leads.insert(user, lead));
        Ok(())
    }

    async fn lead_for_user(&self, user: UserId) -> Result<Option<LeadId>> {
        Ok(self.with(|t| t.leads.get(&user).copied()))
    }

    async fn leads(&self) -> Result<Vec<LeadBinding>> {
        let mut bindings: Vec<LeadBinding> = self.with(|t| {
            t.leads
                .iter()
                .map(|(&user, &lead)| LeadBinding { user, lead })
                .collect()
        });
        bindings.sort_by_key(|b| b.lead);
        Ok(bindings)
    }

    async fn comment_watermark(&self, lead: LeadId) -> Result<Option<i64>> {
        Ok(self.with(|t| t.comment_watermarks.get(&lead).copied()))
    }

    async fn set_comment_watermark(&self, lead: LeadId, comment_id: i64) -> Result<()> {
        self.with(|t| t.comment_watermarks.insert(lead, comment_id));
        Ok(())
    }

    async fn chat_watermark(&self, lead: LeadId) -> Result<Option<i64>> {
        Ok(self.with(|t| t.chat_watermarks.get(&lead).copied()))
    }

    async fn set_chat_watermark(&self, lead: LeadId, timestamp_ms: i64) -> Result<()> {
        self.with(|t| t.chat_watermarks.insert(lead, timestamp_ms));
        Ok(())
    }
}
