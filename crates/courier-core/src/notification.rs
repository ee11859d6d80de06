// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification payload types.
//!
//! Two unions live here. [`ServiceNotification`] is the wire payload carried
//! over store channels and pushed to live connections. [`Notification`] is the
//! mail-path domain event consumed by the dispatcher; it is transient and only
//! ever persisted embedded in a scheduled-event or sent-notification record.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::types::{ConnectionId, ItemId, UserId};

/// Free-form options a client attaches to a lock request.
///
/// Two lock requests compete for the same lock only when their options
/// digest to the same value; the digest lives with the lock manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockOptions(pub serde_json::Map<String, serde_json::Value>);

/// Identity of the user/connection holding (or requesting) an item lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockHolder {
    pub user_id: UserId,
    pub login: String,
    pub display_name: String,
    pub connection_id: ConnectionId,
}

/// One currently-held lock, as pushed to newly-subscribing connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeldLock {
    pub item_id: ItemId,
    pub holder: LockHolder,
}

/// A payload broadcast on a store channel and fanned out to connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ServiceNotification {
    /// A lock request (inbound) or lock grant (outbound). The dispatch hook
    /// substitutes the holder with the existing one when the item is already
    /// locked.
    ItemLock {
        item_id: ItemId,
        holder: LockHolder,
        #[serde(default)]
        options: LockOptions,
        #[serde(default, rename = "override")]
        override_lock: bool,
    },
    /// A release request; suppressed unless the caller matches the holder.
    ItemUnlock {
        item_id: ItemId,
        user_id: UserId,
        connection_id: ConnectionId,
        #[serde(default)]
        options: LockOptions,
    },
    /// Synthesized when a lock key expires in the store, and published by a
    /// successful unlock.
    ItemReleased {
        item_id: ItemId,
        #[serde(default)]
        options_digest: String,
    },
    /// The full set of currently-held locks for an account. Pushed to a
    /// connection on subscribe, never broadcast.
    CurrentLocks { locks: Vec<HeldLock> },
    /// An application-defined broadcast, optionally restricted to admins.
    Broadcast {
        payload: serde_json::Value,
        #[serde(default)]
        admins_only: bool,
    },
}

/// Discriminant of a [`ServiceNotification`]. The dispatch-hook registry is
/// an exhaustive match over this enum so every variant has a deliberate hook
/// (or deliberately none).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    ItemLock,
    ItemUnlock,
    ItemReleased,
    CurrentLocks,
    Broadcast,
}

impl ServiceNotification {
    /// The discriminant of this payload.
    pub fn kind(&self) -> NotificationKind {
        match self {
            ServiceNotification::ItemLock { .. } => NotificationKind::ItemLock,
            ServiceNotification::ItemUnlock { .. } => NotificationKind::ItemUnlock,
            ServiceNotification::ItemReleased { .. } => NotificationKind::ItemReleased,
            ServiceNotification::CurrentLocks { .. } => NotificationKind::CurrentLocks,
            ServiceNotification::Broadcast { .. } => NotificationKind::Broadcast,
        }
    }

    /// True when this payload must only reach connections whose permission
    /// snapshot marks them admin.
    pub fn admins_only(&self) -> bool {
        match self {
            ServiceNotification::Broadcast { admins_only, .. } => *admins_only,
            _ => false,
        }
    }
}

/// Kind of entity a notification target points at.
///
/// `None` is the dummy notifier kind: targets carrying it are registered but
/// never resolve to recipients.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NotifierKind {
    User,
    Group,
    None,
}

/// One explicit target of a custom notification, or one persisted target row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
    pub notifier_kind: NotifierKind,
    pub target_id: String,
}

/// A mail-path domain event, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "kind",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Notification {
    /// An item was published.
    Publish { item_id: ItemId, actor_id: UserId },
    /// A publish was requested and awaits approval.
    PublishRequest { item_id: ItemId, actor_id: UserId },
    /// A review of an item was requested.
    ReviewRequest { item_id: ItemId, actor_id: UserId },
    /// A free-text notification with an explicit target list.
    Custom {
        subject: String,
        text: String,
        #[serde(default)]
        html: Option<String>,
        actor_id: UserId,
        targets: Vec<TargetRef>,
    },
}

impl Notification {
    /// The stable kind string, as persisted in scheduled/sent records.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Notification::Publish { .. } => "PUBLISH",
            Notification::PublishRequest { .. } => "PUBLISH_REQUEST",
            Notification::ReviewRequest { .. } => "REVIEW_REQUEST",
            Notification::Custom { .. } => "CUSTOM",
        }
    }

    /// The item this notification is scoped to, if any.
    pub fn item_id(&self) -> Option<&ItemId> {
        match self {
            Notification::Publish { item_id, .. }
            | Notification::PublishRequest { item_id, .. }
            | Notification::ReviewRequest { item_id, .. } => Some(item_id),
            Notification::Custom { .. } => None,
        }
    }

    /// The user whose action produced this notification.
    pub fn actor_id(&self) -> &UserId {
        match self {
            Notification::Publish { actor_id, .. }
            | Notification::PublishRequest { actor_id, .. }
            | Notification::ReviewRequest { actor_id, .. }
            | Notification::Custom { actor_id, .. } => actor_id,
        }
    }
}
