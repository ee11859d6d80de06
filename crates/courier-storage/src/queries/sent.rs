// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sent-notification log operations. Insert and read-back only; rows are
//! never updated.

use rusqlite::params;

use courier_core::CourierError;
use courier_core::types::{AccountId, UserId};

use crate::database::{Database, map_tr_err};
use crate::models::{SentNotification, parse_db_time, to_db_time};

const COLUMNS: &str =
    "id, account_id, kind, message_data, sent_at, sent_to_ids, metadata, template_variables";

/// Append one send-log record.
pub async fn insert(db: &Database, record: &SentNotification) -> Result<(), CourierError> {
    let record = record.clone();
    let message_data = serde_json::to_string(&record.message_data)
        .map_err(|e| CourierError::Internal(format!("serialize message data: {e}")))?;
    let sent_to_ids = serde_json::to_string(&record.sent_to_ids)
        .map_err(|e| CourierError::Internal(format!("serialize recipient ids: {e}")))?;
    let metadata = serde_json::to_string(&record.metadata)
        .map_err(|e| CourierError::Internal(format!("serialize metadata: {e}")))?;
    let template_variables = serde_json::to_string(&record.template_variables)
        .map_err(|e| CourierError::Internal(format!("serialize template variables: {e}")))?;

    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sent_notifications
                 (id, account_id, kind, message_data, sent_at, sent_to_ids, metadata, template_variables)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id,
                    record.account_id.0,
                    record.kind,
                    message_data,
                    to_db_time(&record.sent_at),
                    sent_to_ids,
                    metadata,
                    template_variables,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// All send-log records of one account, newest first.
pub async fn list_for_account(
    db: &Database,
    account: &AccountId,
) -> Result<Vec<SentNotification>, CourierError> {
    let account = account.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM sent_notifications
                 WHERE account_id = ?1 ORDER BY sent_at DESC"
            ))?;
            let rows = stmt.query_map(params![account], row_to_record)?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete every send-log record of one account.
pub async fn delete_for_account(db: &Database, account: &AccountId) -> Result<usize, CourierError> {
    let account = account.0.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "DELETE FROM sent_notifications WHERE account_id = ?1",
                params![account],
            )?;
            Ok(changed)
        })
        .await
        .map_err(map_tr_err)
}

fn row_to_record(row: &rusqlite::Row<'_>) -> Result<SentNotification, rusqlite::Error> {
    let message_data: String = row.get(3)?;
    let sent_at: String = row.get(4)?;
    let sent_to_ids: String = row.get(5)?;
    let metadata: String = row.get(6)?;
    let template_variables: String = row.get(7)?;

    Ok(SentNotification {
        id: row.get(0)?,
        account_id: AccountId(row.get(1)?),
        kind: row.get(2)?,
        message_data: json_col(3, &message_data)?,
        sent_at: parse_db_time(&sent_at).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?,
        sent_to_ids: serde_json::from_str::<Vec<UserId>>(&sent_to_ids).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?,
        metadata: json_col(6, &metadata)?,
        template_variables: serde_json::from_str(&template_variables).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?,
    })
}

fn json_col(idx: usize, raw: &str) -> Result<serde_json::Value, rusqlite::Error> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
