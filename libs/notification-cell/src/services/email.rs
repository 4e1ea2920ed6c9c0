use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::NotificationError;

#[derive(Debug, Clone, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Deserialize)]
struct ResendResponse {
    id: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Returns the provider's message id.
    async fn send(&self, message: EmailMessage) -> Result<String, NotificationError>;
}

/// Transactional email through the Resend HTTP API.
pub struct ResendEmailClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ResendEmailClient {
    /// `None` when email is not configured.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        if !config.is_email_configured() {
            return None;
        }

        Some(Self {
            client: Client::new(),
            api_key: config.resend_api_key.clone(),
            base_url: config.resend_api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl EmailSender for ResendEmailClient {
    async fn send(&self, message: EmailMessage) -> Result<String, NotificationError> {
        let url = format!("{}/emails", self.base_url);
        debug!("Sending email '{}' to {:?}", message.subject, message.to);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&message)
            .send()
            .await
            .map_err(|e| NotificationError::Email(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NotificationError::Email(e.to_string()))?;

        if !status.is_success() {
            error!("Email provider rejected message: {} - {}", status, body);
            return Err(NotificationError::Email(format!("HTTP {}: {}", status, body)));
        }

        let parsed: ResendResponse = serde_json::from_str(&body)
            .map_err(|e| NotificationError::Email(format!("Failed to parse email response: {}", e)))?;

        info!("Email accepted by provider with id {}", parsed.id);
        Ok(parsed.id)
    }
}
