// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification-target CRUD.
//!
//! A target row binds `{notifier_kind, target_id}` to one item. Targets
//! registered on a collection apply to every descendant through the ancestor
//! chain, which is why reads accept a list of item ids.

use std::str::FromStr;

use rusqlite::params;

use courier_core::CourierError;
use courier_core::notification::{NotifierKind, TargetRef};
use courier_core::types::{AccountId, ItemId};

use crate::database::{Database, map_tr_err};
use crate::models::NotificationTarget;

const COLUMNS: &str = "id, account_id, item_id, notifier_kind, target_id";

/// Persist a target. Duplicate registrations are ignored.
pub async fn insert(db: &Database, target: &NotificationTarget) -> Result<(), CourierError> {
    let target = target.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO notification_targets (id, account_id, item_id, notifier_kind, target_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (account_id, item_id, notifier_kind, target_id) DO NOTHING",
                params![
                    target.id,
                    target.account_id.0,
                    target.item_id.0,
                    target.target.notifier_kind.to_string(),
                    target.target.target_id,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// All targets of one account.
pub async fn list_for_account(
    db: &Database,
    account: &AccountId,
) -> Result<Vec<NotificationTarget>, CourierError> {
    let account = account.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM notification_targets WHERE account_id = ?1 ORDER BY item_id"
            ))?;
            let rows = stmt.query_map(params![account], row_to_target)?;
            let mut targets = Vec::new();
            for row in rows {
                targets.push(row?);
            }
            Ok(targets)
        })
        .await
        .map_err(map_tr_err)
}

/// Targets registered on any of the given items (an item plus its ancestors).
pub async fn for_items(
    db: &Database,
    account: &AccountId,
    items: &[ItemId],
) -> Result<Vec<NotificationTarget>, CourierError> {
    if items.is_empty() {
        return Ok(Vec::new());
    }
    let mut args: Vec<String> = Vec::with_capacity(items.len() + 1);
    args.push(account.0.clone());
    args.extend(items.iter().map(|i| i.0.clone()));

    db.connection()
        .call(move |conn| {
            let placeholders = vec!["?"; args.len() - 1].join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM notification_targets
                 WHERE account_id = ? AND item_id IN ({placeholders})"
            ))?;
            let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), row_to_target)?;
            let mut targets = Vec::new();
            for row in rows {
                targets.push(row?);
            }
            Ok(targets)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete one target by id. Returns false when it was absent.
pub async fn delete(db: &Database, id: &str) -> Result<bool, CourierError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed =
                conn.execute("DELETE FROM notification_targets WHERE id = ?1", params![id])?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete every target of one account.
pub async fn delete_for_account(db: &Database, account: &AccountId) -> Result<usize, CourierError> {
    let account = account.0.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "DELETE FROM notification_targets WHERE account_id = ?1",
                params![account],
            )?;
            Ok(changed)
        })
        .await
        .map_err(map_tr_err)
}

fn row_to_target(row: &rusqlite::Row<'_>) -> Result<NotificationTarget, rusqlite::Error> {
    let kind: String = row.get(3)?;
    Ok(NotificationTarget {
        id: row.get(0)?,
        account_id: AccountId(row.get(1)?),
        item_id: ItemId(row.get(2)?),
        target: TargetRef {
            notifier_kind: NotifierKind::from_str(&kind).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?,
            target_id: row.get(4)?,
        },
    })
}
