// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common identifier and routing types used across the Courier workspace.

use serde::{Deserialize, Serialize};

/// Unique identifier for an account (one tenant of the platform).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub String);

/// Unique identifier for a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Unique identifier for an editable item (a document or collection).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub String);

/// Opaque identifier for one live client connection. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub String);

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A logical broadcast scope: one account, or every account.
///
/// Each routing key maps deterministically to exactly one store channel name
/// via [`RoutingKey::channel_name`]; the mapping is reversible through
/// [`RoutingKey::from_channel_name`] so the fan-out loop can recover the
/// scope of an incoming store message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingKey {
    /// Broadcasts scoped to a single account.
    Account(AccountId),
    /// Broadcasts delivered to every connection regardless of account.
    All,
}

/// Discriminant of a [`RoutingKey`], used to register initial-state providers
/// per scope kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutingKeyKind {
    Account,
    All,
}

/// Prefix shared by every store channel name derived from a routing key.
pub const CHANNEL_PREFIX: &str = "courier:channel:";

impl RoutingKey {
    /// The discriminant of this routing key.
    pub fn kind(&self) -> RoutingKeyKind {
        match self {
            RoutingKey::Account(_) => RoutingKeyKind::Account,
            RoutingKey::All => RoutingKeyKind::All,
        }
    }

    /// The account this key is scoped to, if account-scoped.
    pub fn account_id(&self) -> Option<&AccountId> {
        match self {
            RoutingKey::Account(id) => Some(id),
            RoutingKey::All => None,
        }
    }

    /// The deterministic store channel name for this routing key.
    pub fn channel_name(&self) -> String {
        match self {
            RoutingKey::Account(id) => format!("{CHANNEL_PREFIX}account:{id}"),
            RoutingKey::All => format!("{CHANNEL_PREFIX}all"),
        }
    }

    /// Recover a routing key from a store channel name.
    pub fn from_channel_name(channel: &str) -> Option<RoutingKey> {
        let rest = channel.strip_prefix(CHANNEL_PREFIX)?;
        if rest == "all" {
            return Some(RoutingKey::All);
        }
        rest.strip_prefix("account:")
            .filter(|id| !id.is_empty())
            .map(|id| RoutingKey::Account(AccountId(id.to_string())))
    }
}

/// Cached per-connection permission snapshot.
///
/// Recomputed on each new account-scoped subscription; consulted by the
/// fan-out loop when a payload is flagged admins-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionSnapshot {
    pub account_id: AccountId,
    pub is_admin: bool,
}

/// One message received from a store pattern subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreMessage {
    /// The exact channel the message was published on.
    pub channel: String,
    /// The raw payload string.
    pub payload: String,
}

/// A fully-resolved notification recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
}
