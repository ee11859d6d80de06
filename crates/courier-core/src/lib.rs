// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier notification service.
//!
//! This crate provides the shared error taxonomy, identifier and routing
//! types, the wire protocol, the notification payload unions, and the traits
//! through which the rest of the workspace reaches its external collaborators
//! (broadcast store, platform directories, mail transport).

pub mod error;
pub mod notification;
pub mod protocol;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CourierError;
pub use notification::{
    HeldLock, LockHolder, LockOptions, Notification, NotificationKind, NotifierKind,
    ServiceNotification, TargetRef,
};
pub use protocol::{ClientFrame, ControlFrame, DispatchEvent, ServerFrame};
pub use types::{
    AccountId, ConnectionId, ItemId, PermissionSnapshot, Recipient, RoutingKey, RoutingKeyKind,
    StoreMessage, UserId,
};

// Re-export all collaborator traits at crate root.
pub use traits::{
    AccountDirectory, BroadcastStore, DomainLookup, ItemDirectory, MailMessage, MailTransport,
    UserDirectory,
};
