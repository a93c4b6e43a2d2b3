//! In-process CRM used by tests and dry runs.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;

use crate::{
    Error, LeadId, Result,
    api::CrmApi,
    types::{ChatDirection, ChatEntry, Comment, LeadField, NewLead},
};

#[derive(Default)]
struct Lead {
    record: Option<NewLead>,
    comments: Vec<Comment>,
    chat: Vec<ChatEntry>,
}

#[derive(Default)]
struct State {
    next_lead: i64,
    next_comment: i64,
    leads: HashMap<LeadId, Lead>,
    fields: Vec<LeadField>,
    failing_reads: HashSet<LeadId>,
}

/// A CRM kept in memory, with switches to simulate the failures the relay
/// must tolerate.
#[derive(Default)]
pub struct InMemoryCrm {
    state: Mutex<State>,
    chat_unsupported: AtomicBool,
    comments_fail: AtomicBool,
    leads_fail: AtomicBool,
    field_lookups: AtomicUsize,
    chat_attempts: AtomicUsize,
}

impl InMemoryCrm {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    pub fn add_field(&self, id: i64, name: impl Into<String>) {
        self.with(|s| {
            s.fields.push(LeadField {
                id,
                name: name.into(),
            });
        });
    }

    /// Answer chat writes with 404, like a deployment without live chat.
    pub fn set_chat_unsupported(&self, unsupported: bool) {
        self.chat_unsupported.store(unsupported, Ordering::SeqCst);
    }

    pub fn set_comments_fail(&self, fail: bool) {
        self.comments_fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_lead_creation_fails(&self, fail: bool) {
        self.leads_fail.store(fail, Ordering::SeqCst);
    }

    /// Make comment and chat listing fail for `lead`.
    pub fn fail_reads_for(&self, lead: LeadId) {
        self.with(|s| s.failing_reads.insert(lead));
    }

    /// Add a comment with an explicit id, as an operator inside the CRM would.
    pub fn push_comment(&self, lead: LeadId, id: i64, text: Option<&str>) {
        self.with(|s| {
            s.next_comment = s.next_comment.max(id);
            s.leads.entry(lead).or_default().comments.push(Comment {
                id,
                text: text.map(Into::into),
            });
        });
    }

    pub fn push_chat(&self, lead: LeadId, timestamp: &str, message: &str, direction: ChatDirection) {
        self.with(|s| {
            s.leads.entry(lead).or_default().chat.push(ChatEntry {
                timestamp: timestamp.into(),
                message: message.into(),
                direction,
            });
        });
    }

    /// Leads created through the API, in creation order.
    pub fn created_leads(&self) -> Vec<(LeadId, NewLead)> {
        let mut leads: Vec<_> = self.with(|s| {
            s.leads
                .iter()
                .filter_map(|(id, lead)| lead.record.clone().map(|r| (*id, r)))
                .collect()
        });
        leads.sort_by_key(|(id, _)| *id);
        leads
    }

    pub fn comments(&self, lead: LeadId) -> Vec<Comment> {
        self.with(|s| {
            s.leads
                .get(&lead)
                .map(|l| l.comments.clone())
                .unwrap_or_default()
        })
    }

    pub fn chat(&self, lead: LeadId) -> Vec<ChatEntry> {
        self.with(|s| {
            s.leads
                .get(&lead)
                .map(|l| l.chat.clone())
                .unwrap_or_default()
        })
    }

    pub fn field_lookups(&self) -> usize {
        self.field_lookups.load(Ordering::SeqCst)
    }

    pub fn chat_attempts(&self) -> usize {
        self.chat_attempts.load(Ordering::SeqCst)
    }

    fn check_reads(&self, lead: LeadId, context: &str) -> Result<()> {
        if self.with(|s| s.failing_reads.contains(&lead)) {
            return Err(Error::status(500, context, "simulated failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl CrmApi for InMemoryCrm {
    async fn create_lead(&self, lead: &NewLead) -> Result<LeadId> {
        if self.leads_fail.load(Ordering::SeqCst) {
            return Err(Error::status(503, "create lead", "simulated failure"));
        }
        Ok(self.with(|s| {
            s.next_lead += 1;
            let id = LeadId(s.next_lead);
            s.leads.entry(id).or_default().record = Some(lead.clone());
            id
        }))
    }

    async fn lead_fields(&self) -> Result<Vec<LeadField>> {
        self.field_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.with(|s| s.fields.clone()))
    }

    async fn add_comment(&self, lead: LeadId, text: &str) -> Result<()> {
        if self.comments_fail.load(Ordering::SeqCst) {
            return Err(Error::status(500, "add comment", "simulated failure"));
        }
        self.with(|s| {
            s.next_comment += 1;
            let id = s.next_comment;
            s.leads.entry(lead).or_default().comments.push(Comment {
                id,
                text: Some(text.to_string()),
            });
        });
        Ok(())
    }

    async fn list_comments(&self, lead: LeadId) -> Result<Vec<Comment>> {
        self.check_reads(lead, "list comments")?;
        Ok(self.comments(lead))
    }

    async fn list_chat_history(&self, lead: LeadId) -> Result<Vec<ChatEntry>> {
        self.check_reads(lead, "list chat")?;
        Ok(self.chat(lead))
    }

    async fn add_chat_message(
        &self,
        lead: LeadId,
        text: &str,
        direction: ChatDirection,
    ) -> Result<()> {
        self.chat_attempts.fetch_add(1, Ordering::SeqCst);
        if self.chat_unsupported.load(Ordering::SeqCst) {
            return Err(Error::status(404, "add chat message", "not found"));
        }
        let timestamp = chrono::Utc::now().to_rfc3339();
        self.push_chat(lead, &timestamp, text, direction);
        Ok(())
    }
}
