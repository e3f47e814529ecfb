use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use tracing::info;

use crate::config::Config;

/// Subject line shared by all operator notifications.
const SUBJECT: &str = "Dehumidifier alert";

/// One-way operator notification channel. No retry anywhere; a delivery
/// failure propagates to the caller.
#[async_trait]
pub trait Notifier {
    async fn notify(&self, body: &str) -> Result<()>;
}

/// Sends plain-text email through SES from the configured sender to the
/// configured recipient.
#[derive(Debug, Clone)]
pub struct EmailNotifier {
    ses: aws_sdk_sesv2::Client,
    sender: String,
    recipient: String,
}

impl EmailNotifier {
    pub fn new(ses: aws_sdk_sesv2::Client, config: &Config) -> Self {
        Self {
            ses,
            sender: config.sender_email.clone(),
            recipient: config.recipient_email.clone(),
        }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, body: &str) -> Result<()> {
        info!(recipient = %self.recipient, "Sending notification email");

        let subject = Content::builder()
            .data(SUBJECT)
            .charset("UTF-8")
            .build()
            .context("invalid notification subject")?;

        let text = Content::builder()
            .data(body)
            .charset("UTF-8")
            .build()
            .context("invalid notification body")?;

        let message = Message::builder()
            .subject(subject)
            .body(Body::builder().text(text).build())
            .build();

        self.ses
            .send_email()
            .from_email_address(&self.sender)
            .destination(
                Destination::builder()
                    .to_addresses(&self.recipient)
                    .build(),
            )
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .context("SES send_email call failed")?;

        Ok(())
    }
}
