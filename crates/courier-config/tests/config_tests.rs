// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end configuration loading tests.

use courier_config::model::StoreBackend;
use courier_config::{ConfigError, load_and_validate_str};

#[test]
fn full_config_parses_and_validates() {
    let config = load_and_validate_str(
        r#"
        [server]
        host = "0.0.0.0"
        port = 9100
        bearer_token = "secret"
        log_level = "debug"

        [store]
        backend = "redis"
        url = "redis://cache.internal:6380/"

        [storage]
        database_path = "/var/lib/courier/courier.db"

        [locks]
        ttl_secs = 300

        [scheduler]
        sweep_interval_secs = 30
        lookahead_secs = 120
        stale_claim_secs = 900

        [mail]
        host = "smtp.internal"
        port = 465
        from_name = "Notifications"
        from_address = "noreply@example.org"

        [platform]
        base_url = "https://platform.internal"
        api_token = "token"
        "#,
    )
    .expect("valid config");

    assert_eq!(config.server.port, 9100);
    assert_eq!(config.store.backend, StoreBackend::Redis);
    assert_eq!(config.scheduler.lookahead_secs, 120);
    assert_eq!(config.mail.from_address, "noreply@example.org");
}

#[test]
fn typo_produces_suggestion() {
    let errors = load_and_validate_str(
        r#"
        [scheduler]
        lookahed_secs = 120
        "#,
    )
    .unwrap_err();

    let unknown = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::UnknownKey { key, suggestion, .. } => {
                Some((key.clone(), suggestion.clone()))
            }
            _ => None,
        })
        .expect("unknown-key diagnostic");
    assert_eq!(unknown.0, "lookahed_secs");
    assert_eq!(unknown.1.as_deref(), Some("lookahead_secs"));
}

#[test]
fn semantic_validation_runs_after_parse() {
    let errors = load_and_validate_str(
        r#"
        [locks]
        ttl_secs = 0
        "#,
    )
    .unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("ttl_secs")))
    );
}
