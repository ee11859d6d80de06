// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The notification dispatcher: resolution -> templating -> batch send ->
//! durable send log, plus the scheduled-event sweep.
//!
//! `run_scheduled_events` is the sweep entry point and owns no timer; an
//! external scheduler (the binary's interval loop, cron, an operator)
//! invokes it periodically. Each due record is claimed, dispatched, and
//! deleted independently; one record's failure never aborts the sweep.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

use courier_core::error::CourierError;
use courier_core::notification::Notification;
use courier_core::traits::directory::{
    AccountDirectory, DomainLookup, ItemDirectory, UserDirectory,
};
use courier_core::traits::mailer::{MailMessage, MailTransport};
use courier_core::types::AccountId;
use courier_storage::queries::{scheduled, sent, targets, templates};
use courier_storage::{Database, ScheduledEvent, SentNotification};

use crate::tags::{TagResolver, find_tags};
use crate::targets::TargetResolver;
use crate::templates::{MessageTemplate, default_template, render};

/// Sweep tuning.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// How far ahead of now a sweep picks up due records.
    pub lookahead_secs: u64,
    /// Age after which a claim is considered orphaned by a crashed process
    /// and returned to PENDING.
    pub stale_claim_secs: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            lookahead_secs: 300,
            stale_claim_secs: 3600,
        }
    }
}

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Stale claims returned to PENDING before selection.
    pub released_claims: usize,
    /// Records dispatched and deleted.
    pub dispatched: usize,
    /// Records deleted without dispatch because their item is gone.
    pub discarded: usize,
    /// Records unclaimed for a later retry after a recoverable failure.
    pub deferred: usize,
}

/// Orchestrates notification delivery.
pub struct NotificationDispatcher {
    db: Arc<Database>,
    targets: TargetResolver,
    users: Arc<dyn UserDirectory>,
    items: Arc<dyn ItemDirectory>,
    domains: Arc<dyn DomainLookup>,
    mailer: Arc<dyn MailTransport>,
    lookahead: Duration,
    stale_claim_age: Duration,
}

impl NotificationDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<Database>,
        accounts: Arc<dyn AccountDirectory>,
        users: Arc<dyn UserDirectory>,
        items: Arc<dyn ItemDirectory>,
        domains: Arc<dyn DomainLookup>,
        mailer: Arc<dyn MailTransport>,
        config: DispatcherConfig,
    ) -> Self {
        let targets = TargetResolver::new(accounts, users.clone(), items.clone(), db.clone());
        Self {
            db,
            targets,
            users,
            items,
            domains,
            mailer,
            lookahead: Duration::seconds(config.lookahead_secs as i64),
            stale_claim_age: Duration::seconds(config.stale_claim_secs as i64),
        }
    }

    /// Dispatch a notification immediately.
    ///
    /// Returns the send-log record, or `None` when no recipients resolved
    /// (nothing is sent or logged in that case).
    pub async fn send_now(
        &self,
        account: &AccountId,
        notification: &Notification,
    ) -> Result<Option<SentNotification>, CourierError> {
        let recipients = self.targets.resolve(account, notification).await?;
        if recipients.is_empty() {
            debug!(account = %account, kind = notification.kind_str(), "no recipients, skipping send");
            return Ok(None);
        }

        let template = self.template_for(account, notification).await?;
        let tags = find_tags(&[
            template.subject.as_str(),
            template.text.as_str(),
            template.html.as_deref().unwrap_or(""),
        ]);
        let resolver = TagResolver::new(
            account.clone(),
            notification.clone(),
            self.users.clone(),
            self.items.clone(),
            self.domains.clone(),
        );

        let mut messages = Vec::with_capacity(recipients.len());
        let mut variables_by_user: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for recipient in &recipients {
            let variables = resolver.variables_for(&tags, recipient).await?;
            messages.push(MailMessage {
                to: recipient.clone(),
                subject: render(&template.subject, &variables),
                text: render(&template.text, &variables),
                html: template.html.as_ref().map(|h| render(h, &variables)),
            });
            variables_by_user.insert(recipient.user_id.0.clone(), variables);
        }

        self.mailer.send_batch(&messages).await?;

        let record = SentNotification {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: account.clone(),
            kind: notification.kind_str().to_string(),
            message_data: serde_json::json!({
                "subject": template.subject,
                "text": template.text,
                "html": template.html,
            }),
            sent_at: Utc::now(),
            sent_to_ids: recipients.iter().map(|r| r.user_id.clone()).collect(),
            metadata: metadata_for(notification),
            template_variables: variables_by_user,
        };
        sent::insert(&self.db, &record).await?;
        info!(
            account = %account,
            kind = notification.kind_str(),
            recipients = recipients.len(),
            "notification dispatched"
        );
        Ok(Some(record))
    }

    /// Persist a notification for deferred dispatch at `send_at`.
    pub async fn schedule(
        &self,
        account: &AccountId,
        notification: Notification,
        send_at: DateTime<Utc>,
    ) -> Result<ScheduledEvent, CourierError> {
        let event = ScheduledEvent::new(account.clone(), notification, send_at, Utc::now());
        scheduled::insert(&self.db, &event).await?;
        debug!(account = %account, event = %event.id, send_at = %send_at, "notification scheduled");
        Ok(event)
    }

    /// Create a custom alert: sent immediately, or scheduled when `send_at`
    /// is given.
    pub async fn create_custom_alert(
        &self,
        account: &AccountId,
        alert: Notification,
        send_at: Option<DateTime<Utc>>,
    ) -> Result<Option<ScheduledEvent>, CourierError> {
        if !matches!(alert, Notification::Custom { .. }) {
            return Err(CourierError::Internal(
                "custom alerts require a CUSTOM notification".into(),
            ));
        }
        match send_at {
            Some(at) => Ok(Some(self.schedule(account, alert, at).await?)),
            None => {
                self.send_now(account, &alert).await?;
                Ok(None)
            }
        }
    }

    /// Rewrite a still-pending custom alert.
    pub async fn update_custom_alert(
        &self,
        id: &str,
        send_at: DateTime<Utc>,
        alert: &Notification,
    ) -> Result<(), CourierError> {
        if scheduled::update_pending(&self.db, id, send_at, alert).await? {
            Ok(())
        } else {
            Err(CourierError::NotFound {
                entity: "scheduled event",
                id: id.to_string(),
            })
        }
    }

    /// Delete a scheduled alert by id.
    pub async fn delete_custom_alert(&self, id: &str) -> Result<(), CourierError> {
        if scheduled::delete(&self.db, id).await? {
            Ok(())
        } else {
            Err(CourierError::NotFound {
                entity: "scheduled event",
                id: id.to_string(),
            })
        }
    }

    /// All scheduled notifications of an account.
    pub async fn find_scheduled(
        &self,
        account: &AccountId,
    ) -> Result<Vec<ScheduledEvent>, CourierError> {
        scheduled::list_for_account(&self.db, account).await
    }

    /// The account's send log, newest first.
    pub async fn find_sent(
        &self,
        account: &AccountId,
    ) -> Result<Vec<SentNotification>, CourierError> {
        sent::list_for_account(&self.db, account).await
    }

    /// Remove every notification record of an account (account deletion).
    pub async fn purge_account(&self, account: &AccountId) -> Result<(), CourierError> {
        let events = scheduled::delete_for_account(&self.db, account).await?;
        let logs = sent::delete_for_account(&self.db, account).await?;
        let target_rows = targets::delete_for_account(&self.db, account).await?;
        let template_rows = templates::delete_for_account(&self.db, account).await?;
        info!(
            account = %account,
            events, logs, targets = target_rows, templates = template_rows,
            "account notification data purged"
        );
        Ok(())
    }

    /// Sweep entry point: claim and dispatch every record due within the
    /// lookahead window.
    pub async fn run_scheduled_events(&self) -> Result<SweepReport, CourierError> {
        self.sweep(Utc::now()).await
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, CourierError> {
        let released =
            scheduled::release_stale_claims(&self.db, now - self.stale_claim_age).await?;
        if released > 0 {
            warn!(released, "released stale scheduled-event claims");
        }

        let due = scheduled::find_due(&self.db, now + self.lookahead).await?;
        let mut report = SweepReport {
            released_claims: released,
            ..SweepReport::default()
        };

        for event in due {
            // Exactly one concurrent sweep wins this conditional update.
            if !scheduled::claim(&self.db, &event.id, now).await? {
                continue;
            }
            match self.send_now(&event.account_id, &event.notification).await {
                Ok(_) => {
                    scheduled::delete(&self.db, &event.id).await?;
                    report.dispatched += 1;
                }
                Err(e) if e.is_unrecoverable() => {
                    // Retrying cannot succeed once the item is gone.
                    warn!(error = %e, event = %event.id, "scheduled event discarded");
                    scheduled::delete(&self.db, &event.id).await?;
                    report.discarded += 1;
                }
                Err(e) => {
                    error!(error = %e, event = %event.id, "scheduled dispatch failed, deferred for retry");
                    scheduled::unclaim(&self.db, &event.id).await?;
                    report.deferred += 1;
                }
            }
        }

        Ok(report)
    }

    async fn template_for(
        &self,
        account: &AccountId,
        notification: &Notification,
    ) -> Result<MessageTemplate, CourierError> {
        // Custom notifications carry their own content.
        if matches!(notification, Notification::Custom { .. }) {
            return Ok(default_template(notification));
        }
        match templates::get(&self.db, account, notification.kind_str()).await? {
            Some(t) => Ok(MessageTemplate {
                subject: t.subject,
                text: t.text,
                html: t.html,
            }),
            None => Ok(default_template(notification)),
        }
    }
}

fn metadata_for(notification: &Notification) -> serde_json::Value {
    match notification.item_id() {
        Some(item) => serde_json::json!({
            "itemId": item.0,
            "actorId": notification.actor_id().0,
        }),
        None => serde_json::json!({
            "actorId": notification.actor_id().0,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration as ChronoDuration;
    use tempfile::tempdir;

    use courier_core::notification::{NotifierKind, TargetRef};
    use courier_core::types::{ItemId, UserId};
    use courier_storage::NotificationTemplate;
    use courier_test_utils::{
        MockAccountDirectory, MockDomainLookup, MockItemDirectory, MockUserDirectory,
        RecordingMailer,
    };

    struct Harness {
        dispatcher: NotificationDispatcher,
        db: Arc<Database>,
        mailer: Arc<RecordingMailer>,
        users: Arc<MockUserDirectory>,
        _dir: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Arc::new(Database::open(path.to_str().unwrap()).await.unwrap());

        let accounts = Arc::new(
            MockAccountDirectory::new()
                .with_member("a", "u1")
                .with_member("a", "u2")
                .with_member("a", "u3")
                .with_group("a", "editors", &["u2", "u3"]),
        );
        let users = Arc::new(
            MockUserDirectory::new()
                .with_user("actor-1", "actor@example.org", "The Actor")
                .with_user("u1", "u1@example.org", "User One")
                .with_user("u2", "u2@example.org", "User Two")
                .with_user("u3", "u3@example.org", "User Three"),
        );
        let items = Arc::new(MockItemDirectory::new().with_item("a", "item-1", "Launch Post"));
        let domains = Arc::new(MockDomainLookup::new("example.org"));
        let mailer = Arc::new(RecordingMailer::new());

        let dispatcher = NotificationDispatcher::new(
            db.clone(),
            accounts,
            users.clone(),
            items,
            domains,
            mailer.clone(),
            DispatcherConfig::default(),
        );
        Harness {
            dispatcher,
            db,
            mailer,
            users,
            _dir: dir,
        }
    }

    fn account() -> AccountId {
        AccountId("a".into())
    }

    fn custom_to_everyone(subject: &str, text: &str) -> Notification {
        Notification::Custom {
            subject: subject.into(),
            text: text.into(),
            html: None,
            actor_id: UserId("actor-1".into()),
            targets: vec![
                TargetRef {
                    notifier_kind: NotifierKind::User,
                    target_id: "u1".into(),
                },
                TargetRef {
                    notifier_kind: NotifierKind::Group,
                    target_id: "editors".into(),
                },
            ],
        }
    }

    #[tokio::test]
    async fn send_now_renders_per_recipient_and_logs_once() {
        let h = harness().await;
        let notification = custom_to_everyone("Hello [[name]]", "From [[actor]].");

        let record = h
            .dispatcher
            .send_now(&account(), &notification)
            .await
            .unwrap()
            .expect("recipients resolved");

        let sent_mail = h.mailer.sent().await;
        assert_eq!(sent_mail.len(), 3);
        let subjects: Vec<&str> = sent_mail.iter().map(|m| m.subject.as_str()).collect();
        assert!(subjects.contains(&"Hello User One"));
        assert!(subjects.contains(&"Hello User Two"));
        assert!(sent_mail.iter().all(|m| m.text == "From The Actor."));

        // One shared-tag resolution for the whole batch.
        assert_eq!(h.users.display_name_calls(), 1);

        assert_eq!(record.sent_to_ids.len(), 3);
        assert_eq!(record.template_variables["u1"]["name"], "User One");
        assert_eq!(record.template_variables["u2"]["name"], "User Two");

        let logged = h.dispatcher.find_sent(&account()).await.unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].kind, "CUSTOM");
    }

    #[tokio::test]
    async fn send_now_without_recipients_sends_and_logs_nothing() {
        let h = harness().await;
        let notification = Notification::Custom {
            subject: "s".into(),
            text: "t".into(),
            html: None,
            actor_id: UserId("actor-1".into()),
            targets: vec![],
        };

        let record = h
            .dispatcher
            .send_now(&account(), &notification)
            .await
            .unwrap();
        assert!(record.is_none());
        assert_eq!(h.mailer.sent_count().await, 0);
        assert!(h.dispatcher.find_sent(&account()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stored_template_overrides_the_default() {
        let h = harness().await;
        templates::upsert(
            &h.db,
            &NotificationTemplate {
                account_id: account(),
                kind: "PUBLISH".into(),
                subject: "Custom subject for [[title]]".into(),
                text: "Short note to [[name]].".into(),
                html: None,
            },
        )
        .await
        .unwrap();
        targets::insert(
            &h.db,
            &courier_storage::NotificationTarget::new(
                account(),
                ItemId("item-1".into()),
                TargetRef {
                    notifier_kind: NotifierKind::User,
                    target_id: "u1".into(),
                },
            ),
        )
        .await
        .unwrap();

        h.dispatcher
            .send_now(
                &account(),
                &Notification::Publish {
                    item_id: ItemId("item-1".into()),
                    actor_id: UserId("actor-1".into()),
                },
            )
            .await
            .unwrap();

        let sent_mail = h.mailer.sent().await;
        assert_eq!(sent_mail.len(), 1);
        assert_eq!(sent_mail[0].subject, "Custom subject for Launch Post");
        assert_eq!(sent_mail[0].text, "Short note to User One.");
    }

    #[tokio::test]
    async fn missing_item_discards_after_exactly_one_attempt() {
        let h = harness().await;
        let now = Utc::now();
        let event = h
            .dispatcher
            .schedule(
                &account(),
                Notification::Publish {
                    item_id: ItemId("vanished".into()),
                    actor_id: UserId("actor-1".into()),
                },
                now,
            )
            .await
            .unwrap();

        let report = h.dispatcher.sweep(now).await.unwrap();
        assert_eq!(report.discarded, 1);
        assert_eq!(report.dispatched, 0);
        assert_eq!(report.deferred, 0);

        // Deleted, not retried.
        assert!(scheduled::get(&h.db, &event.id).await.unwrap().is_none());
        let report = h.dispatcher.sweep(now).await.unwrap();
        assert_eq!(report.discarded, 0);
        assert_eq!(h.mailer.sent_count().await, 0);
    }

    #[tokio::test]
    async fn transient_failure_defers_and_retries() {
        let h = harness().await;
        let now = Utc::now();
        let event = h
            .dispatcher
            .schedule(&account(), custom_to_everyone("s", "t"), now)
            .await
            .unwrap();

        h.mailer.fail_times(1);
        let report = h.dispatcher.sweep(now).await.unwrap();
        assert_eq!(report.deferred, 1);
        assert_eq!(report.dispatched, 0);

        // Unclaimed and still present, so the next sweep succeeds.
        let stored = scheduled::get(&h.db, &event.id).await.unwrap().unwrap();
        assert!(stored.claimed_at.is_none());

        let report = h.dispatcher.sweep(now).await.unwrap();
        assert_eq!(report.dispatched, 1);
        assert!(scheduled::get(&h.db, &event.id).await.unwrap().is_none());
        assert_eq!(h.mailer.sent_count().await, 3);
    }

    #[tokio::test]
    async fn future_events_wait_for_their_window() {
        let h = harness().await;
        let now = Utc::now();
        h.dispatcher
            .schedule(
                &account(),
                custom_to_everyone("s", "t"),
                now + ChronoDuration::minutes(30),
            )
            .await
            .unwrap();

        // Outside the 5-minute lookahead: untouched.
        let report = h.dispatcher.sweep(now).await.unwrap();
        assert_eq!(report.dispatched, 0);

        // Within the window once time has moved on.
        let report = h
            .dispatcher
            .sweep(now + ChronoDuration::minutes(26))
            .await
            .unwrap();
        assert_eq!(report.dispatched, 1);
    }

    #[tokio::test]
    async fn orphaned_claims_are_released_and_dispatched() {
        let h = harness().await;
        let now = Utc::now();
        let event = h
            .dispatcher
            .schedule(&account(), custom_to_everyone("s", "t"), now)
            .await
            .unwrap();

        // A crashed process claimed this record two hours ago.
        assert!(
            scheduled::claim(&h.db, &event.id, now - ChronoDuration::hours(2))
                .await
                .unwrap()
        );

        let report = h.dispatcher.sweep(now).await.unwrap();
        assert_eq!(report.released_claims, 1);
        assert_eq!(report.dispatched, 1);
    }

    #[tokio::test]
    async fn custom_alert_crud_paths() {
        let h = harness().await;
        let now = Utc::now();

        // Scheduled creation.
        let event = h
            .dispatcher
            .create_custom_alert(
                &account(),
                custom_to_everyone("v1", "t"),
                Some(now + ChronoDuration::hours(1)),
            )
            .await
            .unwrap()
            .expect("scheduled");
        assert_eq!(h.dispatcher.find_scheduled(&account()).await.unwrap().len(), 1);

        // Update while pending.
        h.dispatcher
            .update_custom_alert(
                &event.id,
                now + ChronoDuration::hours(2),
                &custom_to_everyone("v2", "t"),
            )
            .await
            .unwrap();
        let stored = scheduled::get(&h.db, &event.id).await.unwrap().unwrap();
        assert!(matches!(
            stored.notification,
            Notification::Custom { ref subject, .. } if subject == "v2"
        ));

        // Delete, then typed not-found on the second attempt.
        h.dispatcher.delete_custom_alert(&event.id).await.unwrap();
        let err = h.dispatcher.delete_custom_alert(&event.id).await.unwrap_err();
        assert!(matches!(err, CourierError::NotFound { .. }));

        // Immediate creation sends right away.
        let none = h
            .dispatcher
            .create_custom_alert(&account(), custom_to_everyone("now", "t"), None)
            .await
            .unwrap();
        assert!(none.is_none());
        assert_eq!(h.mailer.sent_count().await, 3);

        // Non-custom payloads are rejected.
        let err = h
            .dispatcher
            .create_custom_alert(
                &account(),
                Notification::Publish {
                    item_id: ItemId("item-1".into()),
                    actor_id: UserId("actor-1".into()),
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::Internal(_)));
    }

    #[tokio::test]
    async fn purge_account_is_scoped() {
        let h = harness().await;
        let now = Utc::now();
        h.dispatcher
            .schedule(&account(), custom_to_everyone("s", "t"), now)
            .await
            .unwrap();
        h.dispatcher
            .send_now(&account(), &custom_to_everyone("s", "t"))
            .await
            .unwrap();

        // Another account's record survives the purge.
        let other = AccountId("b".into());
        scheduled::insert(
            &h.db,
            &ScheduledEvent::new(other.clone(), custom_to_everyone("s", "t"), now, now),
        )
        .await
        .unwrap();

        h.dispatcher.purge_account(&account()).await.unwrap();
        assert!(h.dispatcher.find_scheduled(&account()).await.unwrap().is_empty());
        assert!(h.dispatcher.find_sent(&account()).await.unwrap().is_empty());
        assert_eq!(h.dispatcher.find_scheduled(&other).await.unwrap().len(), 1);
    }
}
