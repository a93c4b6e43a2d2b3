//! Wiring of the long-running relay service.

use std::{sync::Arc, time::Duration};

use {
    courier_channels::Messenger,
    courier_config::CourierConfig,
    courier_crm::{CrmCache, CrmMirror, HttpCrm, LeadBinder, PollSynchronizer, PrefixSelfAuthored},
    courier_relay::{Relay, RelayOptions},
    courier_store::{LinkStore, SqliteLinkStore},
    courier_telegram::TelegramMessenger,
    teloxide::types::ChatId,
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

/// Run until Ctrl-C, or until Telegram reports another poller on the same
/// token.
pub async fn run(config: CourierConfig) -> anyhow::Result<()> {
    let store: Arc<dyn LinkStore> =
        Arc::new(SqliteLinkStore::new(&config.storage.database_url).await?);

    let connected = courier_telegram::connect(&config.telegram.token).await?;
    let group = ChatId(config.telegram.group_id);
    let messenger: Arc<dyn Messenger> =
        Arc::new(TelegramMessenger::new(connected.bot.clone(), group));

    let cancel = CancellationToken::new();
    let mut relay = Relay::new(
        Arc::clone(&store),
        Arc::clone(&messenger),
        RelayOptions::from_config(&config.telegram, Some(connected.id)),
    );

    let mut sync_handle = None;
    if config.crm.enabled {
        let crm_config = &config.crm;
        let cache = Arc::new(CrmCache::new());
        let api = Arc::new(HttpCrm::new(crm_config, Arc::clone(&cache))?);
        let binder = Arc::new(LeadBinder::new(
            api.clone(),
            Arc::clone(&store),
            cache,
            crm_config.username_field.clone(),
        ));
        relay = relay.with_mirror(Arc::new(CrmMirror::new(
            api.clone(),
            binder,
            crm_config.write_mode,
        )));

        let echo = PrefixSelfAuthored::new(crm_config.self_authored_prefixes.iter().cloned());
        let sync = Arc::new(PollSynchronizer::new(
            api,
            Arc::clone(&store),
            Arc::clone(&messenger),
            Arc::new(echo),
            Duration::from_secs(crm_config.poll_interval_secs),
        ));
        sync_handle = Some(sync.spawn(cancel.clone()));
        info!(write_mode = ?crm_config.write_mode, "crm sync enabled");
    } else {
        info!("crm sync disabled");
    }

    let polling = courier_telegram::spawn_polling(
        connected.bot,
        group,
        Arc::new(relay),
        cancel.clone(),
    );

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown requested");
        },
        () = cancel.cancelled() => {},
    }
    cancel.cancel();

    if let Err(e) = polling.await {
        warn!(error = %e, "telegram polling task failed");
    }
    if let Some(handle) = sync_handle
        && let Err(e) = handle.await
    {
        warn!(error = %e, "crm poll task failed");
    }

    info!("courier stopped");
    Ok(())
}
