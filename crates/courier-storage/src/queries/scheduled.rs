// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduled-event queue operations.
//!
//! The claim transition `PENDING -> CLAIMED` is one conditional UPDATE on
//! `claimed_at IS NULL`, so of any number of concurrent sweeps exactly one
//! wins a given record. SQLite serializes the statement; no read-then-write
//! window exists.

use chrono::{DateTime, Utc};
use rusqlite::params;

use courier_core::CourierError;
use courier_core::notification::Notification;
use courier_core::types::AccountId;

use crate::database::{Database, map_tr_err};
use crate::models::{ScheduledEvent, parse_db_time, to_db_time};

const COLUMNS: &str = "id, account_id, kind, send_at, created_at, claimed_at, notification";

/// Persist a new scheduled event.
pub async fn insert(db: &Database, event: &ScheduledEvent) -> Result<(), CourierError> {
    let event = event.clone();
    let notification = serde_json::to_string(&event.notification)
        .map_err(|e| CourierError::Internal(format!("serialize notification: {e}")))?;
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO scheduled_events (id, account_id, kind, send_at, created_at, claimed_at, notification)
                 VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6)",
                params![
                    event.id,
                    event.account_id.0,
                    event.kind,
                    to_db_time(&event.send_at),
                    to_db_time(&event.created_at),
                    notification,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch one scheduled event by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<ScheduledEvent>, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM scheduled_events WHERE id = ?1"
            ))?;
            let mut rows = stmt.query_map(params![id], row_to_event)?;
            match rows.next() {
                Some(row) => Ok(Some(row?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// All scheduled events of one account, soonest first.
pub async fn list_for_account(
    db: &Database,
    account: &AccountId,
) -> Result<Vec<ScheduledEvent>, CourierError> {
    let account = account.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM scheduled_events WHERE account_id = ?1 ORDER BY send_at ASC"
            ))?;
            let rows = stmt.query_map(params![account], row_to_event)?;
            let mut events = Vec::new();
            for row in rows {
                events.push(row?);
            }
            Ok(events)
        })
        .await
        .map_err(map_tr_err)
}

/// All unclaimed events due at or before `due_before`, soonest first.
pub async fn find_due(
    db: &Database,
    due_before: DateTime<Utc>,
) -> Result<Vec<ScheduledEvent>, CourierError> {
    let due = to_db_time(&due_before);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM scheduled_events
                 WHERE claimed_at IS NULL AND send_at <= ?1
                 ORDER BY send_at ASC"
            ))?;
            let rows = stmt.query_map(params![due], row_to_event)?;
            let mut events = Vec::new();
            for row in rows {
                events.push(row?);
            }
            Ok(events)
        })
        .await
        .map_err(map_tr_err)
}

/// Claim one event for processing. Returns false when another sweep won.
pub async fn claim(
    db: &Database,
    id: &str,
    claimed_at: DateTime<Utc>,
) -> Result<bool, CourierError> {
    let id = id.to_string();
    let at = to_db_time(&claimed_at);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE scheduled_events SET claimed_at = ?2 WHERE id = ?1 AND claimed_at IS NULL",
                params![id, at],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Return a claimed event to PENDING so a later sweep retries it.
pub async fn unclaim(db: &Database, id: &str) -> Result<(), CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE scheduled_events SET claimed_at = NULL WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Unclaim every record claimed at or before `older_than`.
///
/// This is the crash-recovery path: a process that died between claim and
/// delete leaves its record claimed forever; aging claims back to PENDING
/// lets a later sweep pick them up.
pub async fn release_stale_claims(
    db: &Database,
    older_than: DateTime<Utc>,
) -> Result<usize, CourierError> {
    let cutoff = to_db_time(&older_than);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE scheduled_events SET claimed_at = NULL
                 WHERE claimed_at IS NOT NULL AND claimed_at <= ?1",
                params![cutoff],
            )?;
            Ok(changed)
        })
        .await
        .map_err(map_tr_err)
}

/// Rewrite an unclaimed event's schedule and payload. Returns false when the
/// event is absent or currently claimed.
pub async fn update_pending(
    db: &Database,
    id: &str,
    send_at: DateTime<Utc>,
    notification: &Notification,
) -> Result<bool, CourierError> {
    let id = id.to_string();
    let kind = notification.kind_str().to_string();
    let send_at = to_db_time(&send_at);
    let notification = serde_json::to_string(notification)
        .map_err(|e| CourierError::Internal(format!("serialize notification: {e}")))?;
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE scheduled_events SET send_at = ?2, kind = ?3, notification = ?4
                 WHERE id = ?1 AND claimed_at IS NULL",
                params![id, send_at, kind, notification],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete one event. Returns false when it was already gone.
pub async fn delete(db: &Database, id: &str) -> Result<bool, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute("DELETE FROM scheduled_events WHERE id = ?1", params![id])?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete every scheduled event of one account.
pub async fn delete_for_account(db: &Database, account: &AccountId) -> Result<usize, CourierError> {
    let account = account.0.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "DELETE FROM scheduled_events WHERE account_id = ?1",
                params![account],
            )?;
            Ok(changed)
        })
        .await
        .map_err(map_tr_err)
}

fn row_to_event(row: &rusqlite::Row<'_>) -> Result<ScheduledEvent, rusqlite::Error> {
    let send_at: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    let claimed_at: Option<String> = row.get(5)?;
    let notification: String = row.get(6)?;
    Ok(ScheduledEvent {
        id: row.get(0)?,
        account_id: AccountId(row.get(1)?),
        kind: row.get(2)?,
        send_at: parse_time_col(3, &send_at)?,
        created_at: parse_time_col(4, &created_at)?,
        claimed_at: claimed_at.as_deref().map(|s| parse_time_col(5, s)).transpose()?,
        notification: serde_json::from_str(&notification).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?,
    })
}

fn parse_time_col(idx: usize, raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    parse_db_time(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Duration as ChronoDuration;
    use tempfile::tempdir;

    use courier_core::types::{ItemId, UserId};

    async fn setup_db() -> (Arc<Database>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        (Arc::new(db), dir)
    }

    fn event(account: &str, send_at: DateTime<Utc>) -> ScheduledEvent {
        ScheduledEvent::new(
            AccountId(account.into()),
            Notification::Publish {
                item_id: ItemId("item-1".into()),
                actor_id: UserId("u1".into()),
            },
            send_at,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn insert_get_list_roundtrip() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let stored = event("acct-1", now);
        insert(&db, &stored).await.unwrap();

        let loaded = get(&db, &stored.id).await.unwrap().unwrap();
        assert_eq!(loaded.account_id, stored.account_id);
        assert_eq!(loaded.kind, "PUBLISH");
        assert_eq!(loaded.notification, stored.notification);
        assert!(loaded.claimed_at.is_none());

        let listed = list_for_account(&db, &AccountId("acct-1".into()))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert!(get(&db, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_due_honors_horizon_and_claims() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();

        let due = event("a", now - ChronoDuration::minutes(1));
        let soon = event("a", now + ChronoDuration::minutes(3));
        let far = event("a", now + ChronoDuration::hours(2));
        for e in [&due, &soon, &far] {
            insert(&db, e).await.unwrap();
        }

        let horizon = now + ChronoDuration::minutes(5);
        let found = find_due(&db, horizon).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, due.id);
        assert_eq!(found[1].id, soon.id);

        // A claimed record disappears from the due set.
        assert!(claim(&db, &due.id, now).await.unwrap());
        let found = find_due(&db, horizon).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, soon.id);
    }

    #[tokio::test]
    async fn concurrent_claims_have_exactly_one_winner() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let stored = event("a", now);
        insert(&db, &stored).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = Arc::clone(&db);
            let id = stored.id.clone();
            handles.push(tokio::spawn(async move { claim(&db, &id, now).await }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn unclaim_returns_record_to_pending() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let stored = event("a", now);
        insert(&db, &stored).await.unwrap();

        assert!(claim(&db, &stored.id, now).await.unwrap());
        assert!(find_due(&db, now).await.unwrap().is_empty());

        unclaim(&db, &stored.id).await.unwrap();
        assert_eq!(find_due(&db, now).await.unwrap().len(), 1);
        // And it can be claimed again.
        assert!(claim(&db, &stored.id, now).await.unwrap());
    }

    #[tokio::test]
    async fn stale_claims_are_released_by_age() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();

        let stuck = event("a", now - ChronoDuration::hours(3));
        let active = event("a", now);
        insert(&db, &stuck).await.unwrap();
        insert(&db, &active).await.unwrap();

        assert!(
            claim(&db, &stuck.id, now - ChronoDuration::hours(2))
                .await
                .unwrap()
        );
        assert!(claim(&db, &active.id, now).await.unwrap());

        let released = release_stale_claims(&db, now - ChronoDuration::hours(1))
            .await
            .unwrap();
        assert_eq!(released, 1);

        let due = find_due(&db, now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, stuck.id);
    }

    #[tokio::test]
    async fn update_applies_to_pending_records_only() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let stored = event("a", now);
        insert(&db, &stored).await.unwrap();

        let replacement = Notification::Custom {
            subject: "Updated".into(),
            text: "body".into(),
            html: None,
            actor_id: UserId("u1".into()),
            targets: vec![],
        };
        let later = now + ChronoDuration::hours(1);
        assert!(
            update_pending(&db, &stored.id, later, &replacement)
                .await
                .unwrap()
        );

        let loaded = get(&db, &stored.id).await.unwrap().unwrap();
        assert_eq!(loaded.kind, "CUSTOM");
        assert_eq!(loaded.notification, replacement);

        // Claimed records are not updatable.
        assert!(claim(&db, &stored.id, now).await.unwrap());
        assert!(
            !update_pending(&db, &stored.id, later, &replacement)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn delete_and_account_scoped_delete() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let mine = event("a", now);
        let theirs = event("b", now);
        insert(&db, &mine).await.unwrap();
        insert(&db, &theirs).await.unwrap();

        // Deleting by id works even on a claimed record (operator path).
        assert!(claim(&db, &mine.id, now).await.unwrap());
        assert!(delete(&db, &mine.id).await.unwrap());
        assert!(!delete(&db, &mine.id).await.unwrap());

        assert_eq!(
            delete_for_account(&db, &AccountId("b".into())).await.unwrap(),
            1
        );
        assert!(get(&db, &theirs.id).await.unwrap().is_none());
    }
}
