// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipient resolution.
//!
//! Custom notifications carry an explicit target list; item-scoped
//! notifications collect the targets registered anywhere on the item's
//! ancestor chain. Either way, membership data is fetched once per
//! resolution, dummy notifier kinds are dropped, groups expand through the
//! account directory, and duplicate ids collapse before the user directory
//! resolves identities.

use std::collections::BTreeSet;
use std::sync::Arc;

use courier_core::error::CourierError;
use courier_core::notification::{Notification, NotifierKind, TargetRef};
use courier_core::traits::directory::{AccountDirectory, ItemDirectory, UserDirectory};
use courier_core::types::{AccountId, Recipient, UserId};
use courier_storage::Database;
use courier_storage::queries::targets;

/// Turns a notification plus account context into a concrete recipient list.
pub struct TargetResolver {
    accounts: Arc<dyn AccountDirectory>,
    users: Arc<dyn UserDirectory>,
    items: Arc<dyn ItemDirectory>,
    db: Arc<Database>,
}

impl TargetResolver {
    pub fn new(
        accounts: Arc<dyn AccountDirectory>,
        users: Arc<dyn UserDirectory>,
        items: Arc<dyn ItemDirectory>,
        db: Arc<Database>,
    ) -> Self {
        Self {
            accounts,
            users,
            items,
            db,
        }
    }

    /// Resolve the recipients of `notification` within `account`.
    ///
    /// Fails with [`CourierError::TargetItemMissing`] when an item-scoped
    /// notification points at an item that no longer exists.
    pub async fn resolve(
        &self,
        account: &AccountId,
        notification: &Notification,
    ) -> Result<Vec<Recipient>, CourierError> {
        // One membership/group fetch per resolution.
        let members = self.accounts.member_ids(account).await?;
        let groups = self.accounts.group_ids(account).await?;

        let mut ids: BTreeSet<UserId> = BTreeSet::new();
        match notification {
            Notification::Custom { targets, .. } => {
                for target in targets {
                    self.collect(account, target, &members, &groups, &mut ids)
                        .await?;
                }
            }
            _ => {
                let item = notification.item_id().ok_or_else(|| {
                    CourierError::Internal("item-scoped notification without item".into())
                })?;
                if !self.items.exists(account, item).await? {
                    return Err(CourierError::TargetItemMissing {
                        item_id: item.0.clone(),
                    });
                }
                // Targets registered on a parent collection apply to all
                // descendants.
                let chain = self.items.ancestor_chain(account, item).await?;
                for row in targets::for_items(&self.db, account, &chain).await? {
                    self.collect(account, &row.target, &members, &groups, &mut ids)
                        .await?;
                }
            }
        }

        let ids: Vec<UserId> = ids.into_iter().collect();
        self.users.get_by_ids(&ids).await
    }

    async fn collect(
        &self,
        account: &AccountId,
        target: &TargetRef,
        members: &[UserId],
        groups: &[String],
        ids: &mut BTreeSet<UserId>,
    ) -> Result<(), CourierError> {
        match target.notifier_kind {
            NotifierKind::None => {}
            NotifierKind::User => {
                let id = UserId(target.target_id.clone());
                if members.contains(&id) {
                    ids.insert(id);
                }
            }
            NotifierKind::Group => {
                if groups.iter().any(|g| *g == target.target_id) {
                    for member in self
                        .accounts
                        .group_member_ids(account, &target.target_id)
                        .await?
                    {
                        ids.insert(member);
                    }
                }
            }
        }
        Ok(())
    }
}
