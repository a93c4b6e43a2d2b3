use async_trait::async_trait;

use crate::{
    LeadId, Result,
    types::{ChatDirection, ChatEntry, Comment, LeadField, NewLead},
};

/// Operations the relay needs from a CRM.
///
/// Authentication is the implementation's concern: callers never see tokens,
/// only the error left after the implementation's single re-login attempt.
#[async_trait]
pub trait CrmApi: Send + Sync {
    async fn create_lead(&self, lead: &NewLead) -> Result<LeadId>;

    /// Custom field definitions for leads.
    async fn lead_fields(&self) -> Result<Vec<LeadField>>;

    async fn add_comment(&self, lead: LeadId, text: &str) -> Result<()>;
    async fn list_comments(&self, lead: LeadId) -> Result<Vec<Comment>>;

    async fn list_chat_history(&self, lead: LeadId) -> Result<Vec<ChatEntry>>;

    /// Write into the lead's live chat. Not every deployment has this
    /// endpoint; callers must treat failure as expected.
    async fn add_chat_message(
        &self,
        lead: LeadId,
        text: &str,
        direction: ChatDirection,
    ) -> Result<()>;
}
