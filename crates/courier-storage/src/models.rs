// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted record types and time formatting helpers.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use courier_core::notification::{Notification, TargetRef};
use courier_core::types::{AccountId, ItemId, UserId};

/// One durable record of a notification to be dispatched at or after
/// `send_at`.
///
/// `claimed_at` implements the claim state machine: `None` is PENDING, a
/// timestamp is CLAIMED. Successful dispatch deletes the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub id: String,
    pub account_id: AccountId,
    pub kind: String,
    pub send_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub notification: Notification,
}

impl ScheduledEvent {
    pub fn new(
        account_id: AccountId,
        notification: Notification,
        send_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            account_id,
            kind: notification.kind_str().to_string(),
            send_at,
            created_at: now,
            claimed_at: None,
            notification,
        }
    }
}

/// Append-only record of one completed dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentNotification {
    pub id: String,
    pub account_id: AccountId,
    pub kind: String,
    /// The rendered message template (subject/text/html, before per-user
    /// variable substitution).
    pub message_data: serde_json::Value,
    pub sent_at: DateTime<Utc>,
    pub sent_to_ids: Vec<UserId>,
    /// Notification context (item, actor) for read-back and audit.
    pub metadata: serde_json::Value,
    /// Resolved template variables, keyed by recipient user id.
    pub template_variables: BTreeMap<String, BTreeMap<String, String>>,
}

/// One persisted notification target row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTarget {
    pub id: String,
    pub account_id: AccountId,
    pub item_id: ItemId,
    pub target: TargetRef,
}

impl NotificationTarget {
    pub fn new(account_id: AccountId, item_id: ItemId, target: TargetRef) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            account_id,
            item_id,
            target,
        }
    }
}

/// Per-account message template override for one notification kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTemplate {
    pub account_id: AccountId,
    pub kind: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

/// Format a timestamp for storage. The fixed millisecond/Z form keeps
/// lexicographic and chronological order identical, so SQL comparisons on the
/// TEXT column are correct.
pub fn to_db_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp.
pub fn parse_db_time(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use courier_core::types::UserId;

    #[test]
    fn db_time_roundtrips_and_sorts() {
        let earlier = Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();

        let a = to_db_time(&earlier);
        let b = to_db_time(&later);
        assert!(a < b, "string order must match time order");
        assert_eq!(parse_db_time(&a).unwrap(), earlier);
    }

    #[test]
    fn new_scheduled_event_starts_pending() {
        let now = Utc::now();
        let event = ScheduledEvent::new(
            AccountId("a".into()),
            Notification::Publish {
                item_id: ItemId("i".into()),
                actor_id: UserId("u".into()),
            },
            now,
            now,
        );
        assert!(event.claimed_at.is_none());
        assert_eq!(event.kind, "PUBLISH");
        assert!(!event.id.is_empty());
    }
}
