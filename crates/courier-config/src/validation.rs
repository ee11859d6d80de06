// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes: non-empty addresses, positive durations, well-formed URLs.

use crate::diagnostic::ConfigError;
use crate::model::{CourierConfig, StoreBackend};

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` when all validations pass, or every collected validation
/// error (does not fail fast).
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("server.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.store.backend == StoreBackend::Redis && config.store.url.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "store.url must be set when store.backend is `redis`".to_string(),
        });
    }

    if config.locks.ttl_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "locks.ttl_secs must be at least 1".to_string(),
        });
    }

    if config.scheduler.sweep_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "scheduler.sweep_interval_secs must be at least 1".to_string(),
        });
    }

    if config.scheduler.stale_claim_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "scheduler.stale_claim_secs must be at least 1".to_string(),
        });
    }

    if !config.mail.from_address.contains('@') {
        errors.push(ConfigError::Validation {
            message: format!(
                "mail.from_address `{}` is not a mail address",
                config.mail.from_address
            ),
        });
    }

    let base_url = config.platform.base_url.trim();
    if !base_url.is_empty()
        && !base_url.starts_with("http://")
        && !base_url.starts_with("https://")
    {
        errors.push(ConfigError::Validation {
            message: format!("platform.base_url `{base_url}` must be an http(s) URL"),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
