//! Persistence trait for the relay's keyed mappings.

use std::fmt;

use {
    async_trait::async_trait,
    courier_channels::{MessageHandle, TopicHandle, UserId},
};

use crate::Result;

/// Identifier of a lead record in the CRM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeadId(pub i64);

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One CRM binding: the lead that mirrors an end-user's conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadBinding {
    pub user: UserId,
    pub lead: LeadId,
}

/// Keyed mappings used for routing and CRM synchronisation.
///
/// Every `save_*` / `set_*` is an upsert (last write wins). Implementations
/// give no cross-key atomicity; callers derive each write from a single event.
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Record that operator-group message `message` belongs to `user`.
    async fn save_link(&self, message: MessageHandle, user: UserId) -> Result<()>;
    async fn user_for_link(&self, message: MessageHandle) -> Result<Option<UserId>>;

    async fn save_topic(&self, user: UserId, topic: TopicHandle) -> Result<()>;
    async fn topic_for_user(&self, user: UserId) -> Result<Option<TopicHandle>>;

    async fn save_lead(&self, user: UserId, lead: LeadId) -> Result<()>;
    async fn lead_for_user(&self, user: UserId) -> Result<Option<LeadId>>;
    /// Every CRM binding, ordered by lead id.
    async fn leads(&self) -> Result<Vec<LeadBinding>>;

    async fn comment_watermark(&self, lead: LeadId) -> Result<Option<i64>>;
    async fn set_comment_watermark(&self, lead: LeadId, comment_id: i64) -> Result<()>;

    async fn chat_watermark(&self, lead: LeadId) -> Result<Option<i64>>;
    async fn set_chat_watermark(&self, lead: LeadId, timestamp_ms: i64) -> Result<()>;
}
