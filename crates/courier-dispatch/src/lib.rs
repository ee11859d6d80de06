// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification dispatch for the Courier notification service.
//!
//! Turns domain events into at-most-once-per-recipient mail: the target
//! resolver produces recipients, the tag resolver fills template variables,
//! the mail transport sends, and a send-log record is written. The scheduled
//! sweep drives the same path for deferred notifications with crash-safe
//! claiming.

pub mod dispatcher;
pub mod tags;
pub mod targets;
pub mod templates;

pub use dispatcher::{DispatcherConfig, NotificationDispatcher, SweepReport};
pub use tags::{TagResolver, TemplateTag, find_tags};
pub use targets::TargetResolver;
pub use templates::{MessageTemplate, default_template, render};
