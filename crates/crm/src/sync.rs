//! Reverse sync: operator activity written inside the CRM is pulled on a
//! fixed period and relayed to the bound end-user.
//!
//! Each lead has two independent cursors. Comments are ordered by id, chat
//! entries by parsed timestamp; both cursors only move forward.

use std::{sync::Arc, time::Duration};

use {
    courier_channels::{Destination, Messenger, TextFormat},
    courier_store::{LeadBinding, LinkStore},
    tokio::{task::JoinHandle, time::MissedTickBehavior},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    Result,
    api::CrmApi,
    echo::SelfAuthored,
    timestamp::parse_timestamp_ms,
    types::{ChatDirection, ChatEntry},
};

/// Outcome of one pass over every bound lead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub leads: usize,
    pub comments_relayed: usize,
    pub chat_relayed: usize,
    /// Lead/channel pairs that failed this cycle.
    pub failures: usize,
}

impl CycleReport {
    fn is_quiet(&self) -> bool {
        self.comments_relayed == 0 && self.chat_relayed == 0 && self.failures == 0
    }
}

pub struct PollSynchronizer {
    api: Arc<dyn CrmApi>,
    store: Arc<dyn LinkStore>,
    messenger: Arc<dyn Messenger>,
    echo: Arc<dyn SelfAuthored>,
    interval: Duration,
}

impl PollSynchronizer {
    pub fn new(
        api: Arc<dyn CrmApi>,
        store: Arc<dyn LinkStore>,
        messenger: Arc<dyn Messenger>,
        echo: Arc<dyn SelfAuthored>,
        interval: Duration,
    ) -> Self {
        Self {
            api,
            store,
            messenger,
            echo,
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    /// Run the poll loop on a background task until `cancel` fires.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                "starting crm poll loop"
            );
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        info!("crm poll loop stopped");
                        break;
                    },
                    _ = ticker.tick() => {},
                }

                match self.run_cycle().await {
                    Ok(report) if report.is_quiet() => {
                        debug!(leads = report.leads, "crm poll cycle done");
                    },
                    Ok(report) => info!(
                        leads = report.leads,
                        comments = report.comments_relayed,
                        chat = report.chat_relayed,
                        failures = report.failures,
                        "crm poll cycle done"
                    ),
                    Err(e) => warn!(error = %e, "crm poll cycle failed"),
                }
            }
        })
    }

    /// One pass over every bound lead. Only failing to list the bindings is
    /// an error; per-lead failures are logged and counted.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let bindings = self.store.leads().await?;
        let mut report = CycleReport {
            leads: bindings.len(),
            ..CycleReport::default()
        };

        for binding in bindings {
            match self.sync_comments(binding).await {
                Ok(n) => report.comments_relayed += n,
                Err(e) => {
                    report.failures += 1;
                    warn!(lead_id = %binding.lead, user_id = %binding.user, error = %e, "crm comment sync failed");
                },
            }
            match self.sync_chat(binding).await {
                Ok(n) => report.chat_relayed += n,
                Err(e) => {
                    report.failures += 1;
                    warn!(lead_id = %binding.lead, user_id = %binding.user, error = %e, "crm chat sync failed");
                },
            }
        }
        Ok(report)
    }

    async fn sync_comments(&self, binding: LeadBinding) -> Result<usize> {
        let LeadBinding { user, lead } = binding;
        let watermark = self.store.comment_watermark(lead).await?.unwrap_or(0);

        let mut fresh: Vec<_> = self
            .api
            .list_comments(lead)
            .await?
            .into_iter()
            .filter(|c| c.id > watermark)
            .collect();
        fresh.sort_by_key(|c| c.id);

        let mut processed = watermark;
        let mut relayed = 0;
        let mut failure = None;
        for comment in fresh {
            let text = comment.text.as_deref().unwrap_or_default();
            if text.trim().is_empty() || self.echo.is_self_authored(text) {
                processed = comment.id;
                continue;
            }
            match self
                .messenger
                .send_text(Destination::EndUser(user), text, TextFormat::Plain)
                .await
            {
                Ok(_) => {
                    processed = comment.id;
                    relayed += 1;
                },
                Err(e) => {
                    failure = Some(e);
                    break;
                },
            }
        }

        if processed > watermark {
            self.store.set_comment_watermark(lead, processed).await?;
            debug!(lead_id = %lead, watermark = processed, "comment watermark advanced");
        }
        match failure {
            Some(e) => Err(e.into()),
            None => Ok(relayed),
        }
    }

    async fn sync_chat(&self, binding: LeadBinding) -> Result<usize> {
        let LeadBinding { user, lead } = binding;
        let watermark = self.store.chat_watermark(lead).await?.unwrap_or(0);

        let mut fresh: Vec<(i64, ChatEntry)> = self
            .api
            .list_chat_history(lead)
            .await?
            .into_iter()
            .map(|entry| (parse_timestamp_ms(&entry.timestamp), entry))
            .filter(|(ts, _)| *ts > watermark)
            .collect();
        fresh.sort_by_key(|(ts, _)| *ts);

        // Timestamps are not unique. `settled` is the newest timestamp whose
        // entries have all been handled; a failure may only advance to it.
        let mut processed = watermark;
        let mut settled = watermark;
        let mut relayed = 0;
        let mut failure = None;
        for (ts, entry) in fresh {
            if ts > processed {
                settled = processed;
            }
            let relay =
                entry.direction == ChatDirection::Outbound && !entry.message.trim().is_empty();
            if relay {
                if let Err(e) = self
                    .messenger
                    .send_text(Destination::EndUser(user), &entry.message, TextFormat::Plain)
                    .await
                {
                    failure = Some(e);
                    break;
                }
                relayed += 1;
            }
            processed = ts;
        }

        let advance_to = if failure.is_some() {
            settled
        } else {
            processed
        };
        if advance_to > watermark {
            self.store.set_chat_watermark(lead, advance_to).await?;
            debug!(lead_id = %lead, watermark = advance_to, "chat watermark advanced");
        }
        match failure {
            Some(e) => Err(e.into()),
            None => Ok(relayed),
        }
    }
}
