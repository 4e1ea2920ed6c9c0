use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::{CreditPackage, PaymentError};

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// Payment processor API, form-encoded as the processor expects.
pub struct StripeClient {
    client: Client,
    base_url: String,
    secret_key: String,
    app_url: String,
}

impl StripeClient {
    /// `None` when no processor key is configured.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        if !config.is_payments_configured() {
            return None;
        }

        Some(Self {
            client: Client::new(),
            base_url: config.stripe_api_base.trim_end_matches('/').to_string(),
            secret_key: config.stripe_secret_key.clone(),
            app_url: config.app_url.trim_end_matches('/').to_string(),
        })
    }

    /// POST /checkout/sessions
    pub async fn create_checkout_session(
        &self,
        user_id: &str,
        email: Option<&str>,
        package: &CreditPackage,
    ) -> Result<StripeCheckoutSession, PaymentError> {
        let url = format!("{}/checkout/sessions", self.base_url);
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            (
                "success_url".to_string(),
                format!("{}/payments/success?session_id={{CHECKOUT_SESSION_ID}}", self.app_url),
            ),
            ("cancel_url".to_string(), format!("{}/payments/cancelled", self.app_url)),
            ("client_reference_id".to_string(), user_id.to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("line_items[0][price_data][currency]".to_string(), package.currency.clone()),
            ("line_items[0][price_data][unit_amount]".to_string(), package.amount_cents.to_string()),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                format!("{} credit package ({} credits)", package.name, package.credits),
            ),
            ("metadata[user_id]".to_string(), user_id.to_string()),
            ("metadata[package_id]".to_string(), package.id.clone()),
            ("metadata[credits]".to_string(), package.credits.to_string()),
        ];
        if let Some(email) = email {
            form.push(("customer_email".to_string(), email.to_string()));
        }

        debug!("Creating checkout session for {} ({})", user_id, package.id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| PaymentError::Processor(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| PaymentError::Processor(e.to_string()))?;

        if !status.is_success() {
            error!("Checkout session creation failed: {} - {}", status, text);
            return Err(PaymentError::Processor(format!("HTTP {}: {}", status, text)));
        }

        let session: StripeCheckoutSession = serde_json::from_str(&text)
            .map_err(|e| PaymentError::Processor(format!("Failed to parse session response: {}", e)))?;

        info!("Checkout session {} created for {}", session.id, user_id);
        Ok(session)
    }
}
