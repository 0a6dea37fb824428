// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Outgoing mail for accepted contact submissions.

use crate::config::MailConfig;
use crate::validator::ValidContact;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

/// A plain-text email ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub reply_to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport failed: {0}")]
    Transport(String),

    #[error("mail provider rejected message with status {status}")]
    Rejected { status: u16 },
}

/// Email dispatch channel.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Build the notification for a contact submission.
///
/// Returns `None` when no sender address is configured.
pub fn compose_contact_email(config: &MailConfig, contact: &ValidContact) -> Option<EmailMessage> {
    let from = config.from_address.clone()?;
    let to = config.recipient()?.to_string();

    Some(EmailMessage {
        from,
        to,
        reply_to: contact.email.clone(),
        subject: format!("{} Message from {}", config.subject_prefix, contact.name)
            .trim_start()
            .to_string(),
        body: format!(
            "Name: {}\nEmail: {}\n\n{}\n",
            contact.name, contact.email, contact.message
        ),
    })
}

/// Writes messages to the log instead of sending them.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        info!(
            to = %message.to,
            reply_to = %message.reply_to,
            subject = %message.subject,
            body_chars = message.body.chars().count(),
            "Contact email (log transport)"
        );
        Ok(())
    }
}

/// Sends messages through an HTTP mail API as a JSON POST.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_token: Option<String>,
}

impl HttpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let endpoint = config
            .http_endpoint
            .clone()
            .ok_or_else(|| MailError::Transport("no mail endpoint configured".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| MailError::Transport(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_token: config.api_token.clone(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let mut request = self.client.post(&self.endpoint).json(message);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Rejected {
                status: status.as_u16(),
            });
        }

        debug!(status = status.as_u16(), "Mail provider accepted message");
        Ok(())
    }
}
