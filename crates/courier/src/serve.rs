// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier serve` command implementation.
//!
//! Wires the broadcast store, the pub/sub bridge with its lock hooks, the
//! WebSocket gateway, and the dispatcher. The periodic sweep timer lives
//! here: the queue component owns no timer of its own, the binary is its
//! scheduler.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use courier_config::CourierConfig;
use courier_config::model::StoreBackend;
use courier_core::error::CourierError;
use courier_core::traits::store::BroadcastStore;
use courier_dispatch::{DispatcherConfig, NotificationDispatcher};
use courier_gateway::{AuthConfig, GatewayState, start_server};
use courier_mail::{SmtpMailer, SmtpMailerConfig};
use courier_realtime::{ItemLockManager, PubSubBridge};
use courier_storage::Database;
use courier_store::{MemoryStore, RedisStore};

use crate::platform::PlatformClient;

/// Run the `courier serve` command until interrupted.
pub async fn run_serve(config: CourierConfig) -> Result<(), CourierError> {
    let store: Arc<dyn BroadcastStore> = match config.store.backend {
        StoreBackend::Memory => {
            info!("using in-memory broadcast store");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Redis => {
            info!(url = %config.store.url, "connecting to Redis broadcast store");
            Arc::new(RedisStore::connect(&config.store.url).await?)
        }
    };

    let db = Arc::new(Database::open(&config.storage.database_path).await?);
    let platform = Arc::new(PlatformClient::new(
        &config.platform.base_url,
        config.platform.api_token.clone(),
    )?);

    let locks = Arc::new(ItemLockManager::new(
        store.clone(),
        Duration::from_secs(config.locks.ttl_secs),
    ));
    let mut bridge = PubSubBridge::new(store, platform.clone());
    bridge.register_lock_hooks(locks);
    let bridge = Arc::new(bridge);
    let bridge_tasks = bridge.clone().start().await?;

    let mailer = Arc::new(SmtpMailer::new(&SmtpMailerConfig {
        host: config.mail.host.clone(),
        port: config.mail.port,
        username: config.mail.username.clone(),
        password: config.mail.password.clone(),
        from_name: config.mail.from_name.clone(),
        from_address: config.mail.from_address.clone(),
    })?);
    let dispatcher = Arc::new(NotificationDispatcher::new(
        db,
        platform.clone(),
        platform.clone(),
        platform.clone(),
        platform,
        mailer,
        DispatcherConfig {
            lookahead_secs: config.scheduler.lookahead_secs,
            stale_claim_secs: config.scheduler.stale_claim_secs,
        },
    ));

    // Periodic sweep: the external scheduler for the dispatch queue.
    let cancel = CancellationToken::new();
    let sweep_cancel = cancel.clone();
    let sweep_interval = Duration::from_secs(config.scheduler.sweep_interval_secs);
    let sweep_task = tokio::spawn(async move {
        let mut tick = tokio::time::interval(sweep_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = sweep_cancel.cancelled() => break,
                _ = tick.tick() => {
                    match dispatcher.run_scheduled_events().await {
                        Ok(report)
                            if report.dispatched + report.discarded + report.deferred > 0 =>
                        {
                            info!(
                                dispatched = report.dispatched,
                                discarded = report.discarded,
                                deferred = report.deferred,
                                released = report.released_claims,
                                "sweep finished"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "sweep failed"),
                    }
                }
            }
        }
    });

    let state = GatewayState {
        bridge,
        auth: AuthConfig {
            bearer_token: config.server.bearer_token.clone(),
        },
    };
    let server_config = courier_gateway::ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };

    tokio::select! {
        result = start_server(&server_config, state) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    cancel.cancel();
    let _ = sweep_task.await;
    for task in bridge_tasks {
        task.abort();
    }
    Ok(())
}
