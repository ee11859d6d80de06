// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Courier notification service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Courier configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// Gateway server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Broadcast store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// SQLite persistence settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Item lock settings.
    #[serde(default)]
    pub locks: LocksConfig,

    /// Scheduled-dispatch sweep settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Outbound mail settings.
    #[serde(default)]
    pub mail: MailConfig,

    /// Platform collaborator service settings.
    #[serde(default)]
    pub platform: PlatformConfig,
}

/// Gateway server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token required on the WebSocket handshake. `None` disables the
    /// check (trusted upstream middleware).
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8440
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Which broadcast store backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store; single-node deployments and tests.
    Memory,
    /// Redis; required when more than one Courier process serves traffic.
    Redis,
}

/// Broadcast store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Store backend.
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,

    /// Redis URL. Ignored by the memory backend.
    #[serde(default = "default_store_url")]
    pub url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: default_store_url(),
        }
    }
}

fn default_backend() -> StoreBackend {
    StoreBackend::Memory
}

fn default_store_url() -> String {
    "redis://127.0.0.1/".to_string()
}

/// SQLite persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path of the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "courier.db".to_string()
}

/// Item lock configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LocksConfig {
    /// Lock TTL in seconds; refreshed on every lock attempt.
    #[serde(default = "default_lock_ttl")]
    pub ttl_secs: u64,
}

impl Default for LocksConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_lock_ttl(),
        }
    }
}

fn default_lock_ttl() -> u64 {
    600
}

/// Scheduled-dispatch sweep configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Seconds between sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// How far ahead of now a sweep picks up due records, in seconds.
    #[serde(default = "default_lookahead")]
    pub lookahead_secs: u64,

    /// Age in seconds after which an orphaned claim is released.
    #[serde(default = "default_stale_claim")]
    pub stale_claim_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
            lookahead_secs: default_lookahead(),
            stale_claim_secs: default_stale_claim(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_lookahead() -> u64 {
    300
}

fn default_stale_claim() -> u64 {
    3600
}

/// Outbound mail configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MailConfig {
    /// SMTP host.
    #[serde(default = "default_smtp_host")]
    pub host: String,

    /// SMTP port.
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// SMTP username. `None` sends unauthenticated.
    #[serde(default)]
    pub username: Option<String>,

    /// SMTP password.
    #[serde(default)]
    pub password: Option<String>,

    /// Sender display name.
    #[serde(default = "default_from_name")]
    pub from_name: String,

    /// Sender address.
    #[serde(default = "default_from_address")]
    pub from_address: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
            from_name: default_from_name(),
            from_address: default_from_address(),
        }
    }
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_name() -> String {
    "Courier".to_string()
}

fn default_from_address() -> String {
    "notifications@localhost.localdomain".to_string()
}

/// Platform collaborator service configuration (account/user/item
/// directories and domain lookup).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformConfig {
    /// Base URL of the platform API. Empty disables the dispatcher-facing
    /// surface (bridge-only deployments).
    #[serde(default)]
    pub base_url: String,

    /// Bearer token presented to the platform API.
    #[serde(default)]
    pub api_token: Option<String>,
}
