use std::sync::Arc;

use {
    courier_channels::{EndUser, UserId},
    courier_store::LinkStore,
    tracing::{info, warn},
};

use crate::{
    LeadId, Result,
    api::CrmApi,
    cache::CrmCache,
    types::{CustomFieldValue, NewLead},
};

/// Resolves the CRM lead of an end-user, creating it on first contact.
pub struct LeadBinder {
    api: Arc<dyn CrmApi>,
    store: Arc<dyn LinkStore>,
    cache: Arc<CrmCache>,
    username_field: Option<String>,
}

impl LeadBinder {
    pub fn new(
        api: Arc<dyn CrmApi>,
        store: Arc<dyn LinkStore>,
        cache: Arc<CrmCache>,
        username_field: Option<String>,
    ) -> Self {
        Self {
            api,
            store,
            cache,
            username_field: username_field.filter(|f| !f.trim().is_empty()),
        }
    }

    pub async fn ensure_lead(&self, user: &EndUser) -> Result<LeadId> {
        if let Some(lead) = self.store.lead_for_user(user.id).await? {
            return Ok(lead);
        }

        let mut lead = NewLead {
            name: format!("Telegram: {}", user.name_or_fallback()),
            email: placeholder_email(user.id),
            custom_fields: Vec::new(),
        };
        if let Some(handle) = user.handle()
            && let Some(field) = self.username_field_id().await?
        {
            lead.custom_fields.push(CustomFieldValue { id: field, value: handle });
        }

        let id = self.api.create_lead(&lead).await?;
        self.store.save_lead(user.id, id).await?;
        info!(user_id = %user.id, lead_id = %id, "created crm lead");
        Ok(id)
    }

    async fn username_field_id(&self) -> Result<Option<i64>> {
        let Some(name) = self.username_field.as_deref() else {
            return Ok(None);
        };
        self.cache
            .username_field
            .get_or_lookup(|| async {
                let wanted = name.trim().to_lowercase();
                let id = self
                    .api
                    .lead_fields()
                    .await?
                    .into_iter()
                    .find(|f| f.name.trim().to_lowercase() == wanted)
                    .map(|f| f.id);
                if id.is_none() {
                    warn!(field = name, "crm lead field not found, usernames will not be stored");
                }
                Ok(id)
            })
            .await
    }
}

/// The CRM requires a contact detail; Telegram gives us none.
fn placeholder_email(user: UserId) -> String {
    format!("tg{user}@telegram.invalid")
}
