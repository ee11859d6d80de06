// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier sweep` command implementation.
//!
//! Runs one scheduled-event sweep and exits, for deployments that drive the
//! queue from cron instead of the serve loop.

use std::sync::Arc;

use tracing::info;

use courier_config::CourierConfig;
use courier_core::error::CourierError;
use courier_dispatch::{DispatcherConfig, NotificationDispatcher};
use courier_mail::{SmtpMailer, SmtpMailerConfig};
use courier_storage::Database;

use crate::platform::PlatformClient;

/// Run one sweep and report what it did.
pub async fn run_sweep(config: CourierConfig) -> Result<(), CourierError> {
    let db = Arc::new(Database::open(&config.storage.database_path).await?);
    let platform = Arc::new(PlatformClient::new(
        &config.platform.base_url,
        config.platform.api_token.clone(),
    )?);
    let mailer = Arc::new(SmtpMailer::new(&SmtpMailerConfig {
        host: config.mail.host.clone(),
        port: config.mail.port,
        username: config.mail.username.clone(),
        password: config.mail.password.clone(),
        from_name: config.mail.from_name.clone(),
        from_address: config.mail.from_address.clone(),
    })?);

    let dispatcher = NotificationDispatcher::new(
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
    );

    let report = dispatcher.run_scheduled_events().await?;
    info!(
        dispatched = report.dispatched,
        discarded = report.discarded,
        deferred = report.deferred,
        released = report.released_claims,
        "sweep finished"
    );
    println!(
        "sweep: {} dispatched, {} discarded, {} deferred, {} stale claims released",
        report.dispatched, report.discarded, report.deferred, report.released_claims
    );
    Ok(())
}
