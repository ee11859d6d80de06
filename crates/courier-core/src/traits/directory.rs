// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator directory traits.
//!
//! These services live outside this workspace (platform account, user, and
//! content services). Courier consumes them only through these boundaries;
//! production wiring uses thin HTTP clients, tests use the mocks in
//! `courier-test-utils`.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::types::{AccountId, ItemId, Recipient, UserId};

/// Account membership, groups, and admin permission checks.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Ids of every current member of the account.
    async fn member_ids(&self, account: &AccountId) -> Result<Vec<UserId>, CourierError>;

    /// Ids of every group defined on the account.
    async fn group_ids(&self, account: &AccountId) -> Result<Vec<String>, CourierError>;

    /// Member ids of one group.
    async fn group_member_ids(
        &self,
        account: &AccountId,
        group_id: &str,
    ) -> Result<Vec<UserId>, CourierError>;

    /// Whether the user holds admin permission on the account.
    async fn is_admin(&self, account: &AccountId, user: &UserId) -> Result<bool, CourierError>;
}

/// User identity resolution.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve users by id. Unknown ids are silently dropped from the result.
    async fn get_by_ids(&self, ids: &[UserId]) -> Result<Vec<Recipient>, CourierError>;

    /// The display name of one user.
    async fn display_name(&self, id: &UserId) -> Result<String, CourierError>;
}

/// Item existence, titles, and containment.
#[async_trait]
pub trait ItemDirectory: Send + Sync {
    /// Whether the item currently exists in the account.
    async fn exists(&self, account: &AccountId, item: &ItemId) -> Result<bool, CourierError>;

    /// The item itself followed by its ancestors, innermost first.
    ///
    /// Notification targets registered on any entry of the chain apply to the
    /// item.
    async fn ancestor_chain(
        &self,
        account: &AccountId,
        item: &ItemId,
    ) -> Result<Vec<ItemId>, CourierError>;

    /// The item's display title.
    async fn title(&self, account: &AccountId, item: &ItemId) -> Result<String, CourierError>;
}

/// Resolution of an account's public-facing domain, used for link tags.
#[async_trait]
pub trait DomainLookup: Send + Sync {
    async fn public_domain(&self, account: &AccountId) -> Result<String, CourierError>;
}
