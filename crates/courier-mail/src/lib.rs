// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMTP implementation of the mail transport.
//!
//! Sends each batch message individually over a pooled async SMTP
//! connection. Delivery is best-effort: per-message failures are logged and
//! rolled up into one batch error so the scheduled path can retry.

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::warn;

use courier_core::error::CourierError;
use courier_core::traits::mailer::{MailMessage, MailTransport};

/// SMTP connection settings.
///
/// Mirrors the `[mail]` section of `courier-config` so this crate has no
/// dependency on the config crate.
#[derive(Debug, Clone)]
pub struct SmtpMailerConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_name: String,
    pub from_address: String,
}

/// lettre-backed [`MailTransport`].
#[derive(Debug)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build the transport. No connection is opened until the first send.
    pub fn new(config: &SmtpMailerConfig) -> Result<Self, CourierError> {
        let from = mailbox(&config.from_name, &config.from_address)?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| CourierError::Mail {
                message: format!("SMTP relay setup for {} failed", config.host),
                source: Some(Box::new(e)),
            })?
            .port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, message: &MailMessage) -> Result<Message, CourierError> {
        let to = mailbox(&message.to.display_name, &message.to.email)?;
        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone());

        let built = match &message.html {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                message.text.clone(),
                html.clone(),
            )),
            None => builder.body(message.text.clone()),
        };
        built.map_err(|e| CourierError::Mail {
            message: format!("message assembly for {} failed", message.to.email),
            source: Some(Box::new(e)),
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send_batch(&self, messages: &[MailMessage]) -> Result<(), CourierError> {
        let mut failures = 0usize;
        for message in messages {
            let email = self.build_message(message)?;
            if let Err(e) = self.transport.send(email).await {
                warn!(error = %e, to = %message.to.email, "mail send failed");
                failures += 1;
            }
        }
        if failures > 0 {
            return Err(CourierError::Mail {
                message: format!("{failures} of {} messages failed", messages.len()),
                source: None,
            });
        }
        Ok(())
    }
}

fn mailbox(name: &str, address: &str) -> Result<Mailbox, CourierError> {
    let address = address.parse().map_err(|e| CourierError::Mail {
        message: format!("invalid mail address `{address}`"),
        source: Some(Box::new(e)),
    })?;
    Ok(Mailbox::new(Some(name.to_string()), address))
}
