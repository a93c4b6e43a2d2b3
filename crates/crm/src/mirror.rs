//! Mirroring inbound client messages into the CRM.

use std::sync::Arc;

use {
    chrono::{DateTime, Utc},
    courier_channels::{EndUser, InboundMessage},
    courier_config::CrmWriteMode,
    tracing::{debug, warn},
};

use crate::{
    LeadId, Result, api::CrmApi, binder::LeadBinder, echo::MIRROR_COMMENT_PREFIX,
    types::ChatDirection,
};

/// Where a mirrored message ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorChannel {
    Chat,
    Comment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorReceipt {
    pub lead: LeadId,
    pub channel: MirrorChannel,
}

pub struct CrmMirror {
    api: Arc<dyn CrmApi>,
    binder: Arc<LeadBinder>,
    mode: CrmWriteMode,
}

impl CrmMirror {
    pub fn new(api: Arc<dyn CrmApi>, binder: Arc<LeadBinder>, mode: CrmWriteMode) -> Self {
        Self { api, binder, mode }
    }

    /// Write `msg` to its sender's lead, binding the lead first if needed.
    ///
    /// In dual-channel mode the live chat is tried first and any failure
    /// falls back to a comment. An error means nothing was written.
    pub async fn mirror(&self, msg: &InboundMessage) -> Result<MirrorReceipt> {
        let lead = self.binder.ensure_lead(&msg.from).await?;
        let summary = msg.content.summary();

        if self.mode == CrmWriteMode::DualChannel {
            match self
                .api
                .add_chat_message(lead, &summary, ChatDirection::Inbound)
                .await
            {
                Ok(()) => {
                    return Ok(MirrorReceipt {
                        lead,
                        channel: MirrorChannel::Chat,
                    });
                },
                Err(e) if e.is_unsupported() => {
                    debug!(lead_id = %lead, "crm chat not available, writing a comment");
                },
                Err(e) => {
                    warn!(lead_id = %lead, error = %e, "crm chat write failed, writing a comment");
                },
            }
        }

        let text = comment_text(&msg.from, &summary, Utc::now());
        self.api.add_comment(lead, &text).await?;
        Ok(MirrorReceipt {
            lead,
            channel: MirrorChannel::Comment,
        })
    }
}

/// Render the timestamped comment body for a client message.
#[must_use]
pub fn comment_text(user: &EndUser, summary: &str, at: DateTime<Utc>) -> String {
    let who = match user.handle() {
        Some(handle) => format!("{} ({handle}, id {})", user.name_or_fallback(), user.id),
        None => format!("{} (id {})", user.name_or_fallback(), user.id),
    };
    format!(
        "{MIRROR_COMMENT_PREFIX} · {}\n{who}\n\n{summary}",
        at.format("%Y-%m-%d %H:%M:%S UTC")
    )
}
