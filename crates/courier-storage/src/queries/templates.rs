// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-account message template overrides, keyed by notification kind.

use rusqlite::params;

use courier_core::CourierError;
use courier_core::types::AccountId;

use crate::database::{Database, map_tr_err};
use crate::models::NotificationTemplate;

/// Create or replace the template for `(account, kind)`.
pub async fn upsert(db: &Database, template: &NotificationTemplate) -> Result<(), CourierError> {
    let template = template.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO notification_templates (account_id, kind, subject, text, html)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (account_id, kind) DO UPDATE
                 SET subject = excluded.subject, text = excluded.text, html = excluded.html",
                params![
                    template.account_id.0,
                    template.kind,
                    template.subject,
                    template.text,
                    template.html,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// The override for `(account, kind)`, if one exists.
pub async fn get(
    db: &Database,
    account: &AccountId,
    kind: &str,
) -> Result<Option<NotificationTemplate>, CourierError> {
    let account = account.0.clone();
    let kind = kind.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT account_id, kind, subject, text, html
                 FROM notification_templates WHERE account_id = ?1 AND kind = ?2",
            )?;
            let mut rows = stmt.query_map(params![account, kind], |row| {
                Ok(NotificationTemplate {
                    account_id: AccountId(row.get(0)?),
                    kind: row.get(1)?,
                    subject: row.get(2)?,
                    text: row.get(3)?,
                    html: row.get(4)?,
                })
            })?;
            match rows.next() {
                Some(row) => Ok(Some(row?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Remove the override for `(account, kind)`. Returns false when absent.
pub async fn delete(db: &Database, account: &AccountId, kind: &str) -> Result<bool, CourierError> {
    let account = account.0.clone();
    let kind = kind.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "DELETE FROM notification_templates WHERE account_id = ?1 AND kind = ?2",
                params![account, kind],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete every template override of one account.
pub async fn delete_for_account(db: &Database, account: &AccountId) -> Result<usize, CourierError> {
    let account = account.0.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "DELETE FROM notification_templates WHERE account_id = ?1",
                params![account],
            )?;
            Ok(changed)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn template(account: &str, kind: &str, subject: &str) -> NotificationTemplate {
        NotificationTemplate {
            account_id: AccountId(account.into()),
            kind: kind.into(),
            subject: subject.into(),
            text: "Hi [[name]], [[actor]] made changes.".into(),
            html: None,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_existing() {
        let (db, _dir) = setup_db().await;
        upsert(&db, &template("a", "PUBLISH", "v1")).await.unwrap();
        upsert(&db, &template("a", "PUBLISH", "v2")).await.unwrap();

        let loaded = get(&db, &AccountId("a".into()), "PUBLISH")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.subject, "v2");

        assert!(
            get(&db, &AccountId("a".into()), "REVIEW_REQUEST")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn delete_paths() {
        let (db, _dir) = setup_db().await;
        upsert(&db, &template("a", "PUBLISH", "s")).await.unwrap();
        upsert(&db, &template("a", "CUSTOM", "s")).await.unwrap();

        assert!(delete(&db, &AccountId("a".into()), "PUBLISH").await.unwrap());
        assert!(!delete(&db, &AccountId("a".into()), "PUBLISH").await.unwrap());

        assert_eq!(
            delete_for_account(&db, &AccountId("a".into())).await.unwrap(),
            1
        );
    }
}
