// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mail transport trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CourierError;
use crate::types::Recipient;

/// One fully-rendered message addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    pub to: Recipient,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

/// Outbound mail delivery.
///
/// Delivery is best-effort: a batch that partially fails returns an error so
/// the scheduled path can retry the whole batch. Re-sends may duplicate mail;
/// exactly-once delivery to the transport is explicitly not guaranteed.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send_batch(&self, messages: &[MailMessage]) -> Result<(), CourierError>;
}
