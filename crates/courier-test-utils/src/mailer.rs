// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording mail transport for dispatcher tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use courier_core::error::CourierError;
use courier_core::traits::mailer::{MailMessage, MailTransport};

/// A [`MailTransport`] that captures batches and can be told to fail.
#[derive(Default)]
pub struct RecordingMailer {
    batches: Mutex<Vec<Vec<MailMessage>>>,
    fail_remaining: AtomicUsize,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` send attempts fail with a transport error.
    pub fn fail_times(&self, n: usize) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Every batch passed to `send_batch`, in order.
    pub async fn batches(&self) -> Vec<Vec<MailMessage>> {
        self.batches.lock().await.clone()
    }

    /// All sent messages, flattened across batches.
    pub async fn sent(&self) -> Vec<MailMessage> {
        self.batches.lock().await.iter().flatten().cloned().collect()
    }

    pub async fn sent_count(&self) -> usize {
        self.batches.lock().await.iter().map(|b| b.len()).sum()
    }
}

#[async_trait]
impl MailTransport for RecordingMailer {
    async fn send_batch(&self, messages: &[MailMessage]) -> Result<(), CourierError> {
        let remaining = self.fail_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(CourierError::Mail {
                message: "simulated transport failure".into(),
                source: None,
            });
        }
        self.batches.lock().await.push(messages.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::types::{Recipient, UserId};

    fn message(to: &str) -> MailMessage {
        MailMessage {
            to: Recipient {
                user_id: UserId(to.into()),
                email: format!("{to}@example.org"),
                display_name: to.to_string(),
            },
            subject: "s".into(),
            text: "t".into(),
            html: None,
        }
    }

    #[tokio::test]
    async fn records_batches_in_order() {
        let mailer = RecordingMailer::new();
        mailer.send_batch(&[message("a"), message("b")]).await.unwrap();
        mailer.send_batch(&[message("c")]).await.unwrap();

        assert_eq!(mailer.batches().await.len(), 2);
        assert_eq!(mailer.sent_count().await, 3);
    }

    #[tokio::test]
    async fn fails_the_requested_number_of_times() {
        let mailer = RecordingMailer::new();
        mailer.fail_times(1);

        assert!(mailer.send_batch(&[message("a")]).await.is_err());
        assert!(mailer.send_batch(&[message("a")]).await.is_ok());
        assert_eq!(mailer.sent_count().await, 1);
    }
}
