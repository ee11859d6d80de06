// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock platform directories with builder-style fixtures and call counters.
//!
//! The counters exist so tests can assert the caching contracts: one admin
//! lookup per subscribe call, one member fetch per target resolution, one
//! title/domain lookup per dispatch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use courier_core::error::CourierError;
use courier_core::traits::directory::{
    AccountDirectory, DomainLookup, ItemDirectory, UserDirectory,
};
use courier_core::types::{AccountId, ItemId, Recipient, UserId};

/// Mock [`AccountDirectory`] with per-account members, groups, and admins.
#[derive(Default)]
pub struct MockAccountDirectory {
    members: HashMap<String, Vec<UserId>>,
    groups: HashMap<String, Vec<(String, Vec<UserId>)>>,
    admins: Vec<(String, String)>,
    member_fetches: AtomicUsize,
    admin_checks: AtomicUsize,
}

impl MockAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(mut self, account: &str, user: &str) -> Self {
        self.members
            .entry(account.to_string())
            .or_default()
            .push(UserId(user.to_string()));
        self
    }

    pub fn with_group(mut self, account: &str, group: &str, members: &[&str]) -> Self {
        self.groups.entry(account.to_string()).or_default().push((
            group.to_string(),
            members.iter().map(|m| UserId(m.to_string())).collect(),
        ));
        self
    }

    pub fn with_admin(mut self, account: &str, user: &str) -> Self {
        self.admins.push((account.to_string(), user.to_string()));
        self
    }

    /// How often `member_ids` was called.
    pub fn member_fetches(&self) -> usize {
        self.member_fetches.load(Ordering::SeqCst)
    }

    /// How often `is_admin` was called.
    pub fn admin_checks(&self) -> usize {
        self.admin_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountDirectory for MockAccountDirectory {
    async fn member_ids(&self, account: &AccountId) -> Result<Vec<UserId>, CourierError> {
        self.member_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.members.get(&account.0).cloned().unwrap_or_default())
    }

    async fn group_ids(&self, account: &AccountId) -> Result<Vec<String>, CourierError> {
        Ok(self
            .groups
            .get(&account.0)
            .map(|groups| groups.iter().map(|(id, _)| id.clone()).collect())
            .unwrap_or_default())
    }

    async fn group_member_ids(
        &self,
        account: &AccountId,
        group_id: &str,
    ) -> Result<Vec<UserId>, CourierError> {
        Ok(self
            .groups
            .get(&account.0)
            .and_then(|groups| {
                groups
                    .iter()
                    .find(|(id, _)| id == group_id)
                    .map(|(_, members)| members.clone())
            })
            .unwrap_or_default())
    }

    async fn is_admin(&self, account: &AccountId, user: &UserId) -> Result<bool, CourierError> {
        self.admin_checks.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .admins
            .iter()
            .any(|(a, u)| *a == account.0 && *u == user.0))
    }
}

/// Mock [`UserDirectory`] resolving ids to fixed recipients.
#[derive(Default)]
pub struct MockUserDirectory {
    users: HashMap<String, Recipient>,
    display_name_calls: AtomicUsize,
}

impl MockUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, id: &str, email: &str, display_name: &str) -> Self {
        self.users.insert(
            id.to_string(),
            Recipient {
                user_id: UserId(id.to_string()),
                email: email.to_string(),
                display_name: display_name.to_string(),
            },
        );
        self
    }

    /// How often `display_name` was called.
    pub fn display_name_calls(&self) -> usize {
        self.display_name_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserDirectory for MockUserDirectory {
    async fn get_by_ids(&self, ids: &[UserId]) -> Result<Vec<Recipient>, CourierError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.users.get(&id.0).cloned())
            .collect())
    }

    async fn display_name(&self, id: &UserId) -> Result<String, CourierError> {
        self.display_name_calls.fetch_add(1, Ordering::SeqCst);
        self.users
            .get(&id.0)
            .map(|u| u.display_name.clone())
            .ok_or(CourierError::NotFound {
                entity: "user",
                id: id.0.clone(),
            })
    }
}

/// Mock [`ItemDirectory`] with explicit ancestor chains.
#[derive(Default)]
pub struct MockItemDirectory {
    items: HashMap<(String, String), String>,
    chains: HashMap<String, Vec<ItemId>>,
    title_calls: AtomicUsize,
}

impl MockItemDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, account: &str, item: &str, title: &str) -> Self {
        self.items
            .insert((account.to_string(), item.to_string()), title.to_string());
        self
    }

    /// Fix the ancestor chain of an item (the item itself first).
    pub fn with_chain(mut self, item: &str, chain: &[&str]) -> Self {
        self.chains.insert(
            item.to_string(),
            chain.iter().map(|i| ItemId(i.to_string())).collect(),
        );
        self
    }

    /// How often `title` was called.
    pub fn title_calls(&self) -> usize {
        self.title_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ItemDirectory for MockItemDirectory {
    async fn exists(&self, account: &AccountId, item: &ItemId) -> Result<bool, CourierError> {
        Ok(self.items.contains_key(&(account.0.clone(), item.0.clone())))
    }

    async fn ancestor_chain(
        &self,
        account: &AccountId,
        item: &ItemId,
    ) -> Result<Vec<ItemId>, CourierError> {
        if !self.items.contains_key(&(account.0.clone(), item.0.clone())) {
            return Err(CourierError::TargetItemMissing {
                item_id: item.0.clone(),
            });
        }
        Ok(self
            .chains
            .get(&item.0)
            .cloned()
            .unwrap_or_else(|| vec![item.clone()]))
    }

    async fn title(&self, account: &AccountId, item: &ItemId) -> Result<String, CourierError> {
        self.title_calls.fetch_add(1, Ordering::SeqCst);
        self.items
            .get(&(account.0.clone(), item.0.clone()))
            .cloned()
            .ok_or(CourierError::TargetItemMissing {
                item_id: item.0.clone(),
            })
    }
}

/// Mock [`DomainLookup`] returning one domain per account.
pub struct MockDomainLookup {
    default_domain: String,
    domains: HashMap<String, String>,
    lookups: AtomicUsize,
}

impl MockDomainLookup {
    pub fn new(default_domain: &str) -> Self {
        Self {
            default_domain: default_domain.to_string(),
            domains: HashMap::new(),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn with_domain(mut self, account: &str, domain: &str) -> Self {
        self.domains
            .insert(account.to_string(), domain.to_string());
        self
    }

    /// How often `public_domain` was called.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DomainLookup for MockDomainLookup {
    async fn public_domain(&self, account: &AccountId) -> Result<String, CourierError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .domains
            .get(&account.0)
            .cloned()
            .unwrap_or_else(|| self.default_domain.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn account_directory_counts_lookups() {
        let dir = MockAccountDirectory::new()
            .with_member("a", "u1")
            .with_admin("a", "u1");
        let account = AccountId("a".into());

        assert!(dir.is_admin(&account, &UserId("u1".into())).await.unwrap());
        assert!(!dir.is_admin(&account, &UserId("u2".into())).await.unwrap());
        assert_eq!(dir.admin_checks(), 2);

        assert_eq!(dir.member_ids(&account).await.unwrap().len(), 1);
        assert_eq!(dir.member_fetches(), 1);
    }

    #[tokio::test]
    async fn item_directory_reports_missing_items() {
        let dir = MockItemDirectory::new().with_item("a", "i1", "Title");
        let account = AccountId("a".into());

        assert!(dir.exists(&account, &ItemId("i1".into())).await.unwrap());
        let err = dir
            .ancestor_chain(&account, &ItemId("gone".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::TargetItemMissing { .. }));
    }

    #[tokio::test]
    async fn user_directory_drops_unknown_ids() {
        let dir = MockUserDirectory::new().with_user("u1", "u1@example.org", "User One");
        let found = dir
            .get_by_ids(&[UserId("u1".into()), UserId("ghost".into())])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].email, "u1@example.org");
    }
}
