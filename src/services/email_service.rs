use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};

use crate::config::EmailConfig;
use crate::models::bookings::BookingStatus;

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";
const SEND_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

#[derive(Debug, Serialize, Deserialize)]
pub struct SendGridEmail {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendGridPersonalization {
    pub to: Vec<SendGridEmail>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendGridContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendGridRequest {
    pub personalizations: Vec<SendGridPersonalization>,
    pub from: SendGridEmail,
    pub subject: String,
    pub content: Vec<SendGridContent>,
}

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),
    #[error("Request error: {0}")]
    RequestError(String),
    #[error("API error: {0}")]
    ApiError(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

pub struct SendGridMailer {
    api_key: String,
    from_email: String,
    url: String,
    client: reqwest::Client,
}

impl SendGridMailer {
    pub fn new(config: &EmailConfig) -> Self {
        Self {
            api_key: config.sendgrid_api_key.clone(),
            from_email: config.from_email.clone(),
            url: SENDGRID_URL.to_string(),
            client: reqwest::Client::builder()
                .timeout(SEND_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let to = message.to.trim();
        if !crate::services::account_service::is_valid_email(to) {
            return Err(EmailError::InvalidRecipient(to.to_string()));
        }

        let request = SendGridRequest {
            personalizations: vec![SendGridPersonalization {
                to: vec![SendGridEmail {
                    email: to.to_string(),
                }],
            }],
            from: SendGridEmail {
                email: self.from_email.clone(),
            },
            subject: message.subject.clone(),
            content: vec![SendGridContent {
                content_type: "text/plain".to_string(),
                value: message.body.clone(),
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| EmailError::RequestError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(EmailError::ApiError(format!(
                "Status: {}, Body: {}",
                status, body
            )))
        }
    }
}

/// Stands in when no mail provider is configured; messages only hit the log.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        info!(
            "Mail delivery disabled, dropping '{}' for {}",
            message.subject, message.to
        );
        Ok(())
    }
}

pub fn booking_status_email(
    to: &str,
    customer_name: &str,
    package_name: &str,
    status: BookingStatus,
) -> EmailMessage {
    let (subject, outcome) = match status {
        BookingStatus::Confirmed => ("Your booking is confirmed", "has been confirmed"),
        BookingStatus::Rejected => ("Your booking was not accepted", "has been rejected"),
        BookingStatus::Cancelled => ("Your booking was cancelled", "has been cancelled"),
        BookingStatus::Pending => ("Your booking is pending", "is awaiting review"),
    };

    EmailMessage {
        to: to.to_string(),
        subject: subject.to_string(),
        body: format!(
            "Hi {},\n\nYour booking for \"{}\" {}.\n\nThank you for travelling with Tourease.",
            customer_name, package_name, outcome
        ),
    }
}

pub fn otp_email(to: &str, purpose: &str, otp: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: format!("Your {} code", purpose),
        body: format!(
            "Your {} code is: {}\n\nThis code will expire in 15 minutes.\n\nIf you didn't request this, please ignore this email.",
            purpose, otp
        ),
    }
}
