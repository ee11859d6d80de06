// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for the external collaborators of the notification core.

pub mod directory;
pub mod mailer;
pub mod store;

pub use directory::{AccountDirectory, DomainLookup, ItemDirectory, UserDirectory};
pub use mailer::{MailMessage, MailTransport};
pub use store::BroadcastStore;
