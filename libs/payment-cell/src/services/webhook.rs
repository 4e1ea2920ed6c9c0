use anyhow::{bail, Context};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, info, warn};

use patient_cell::{PatientService, SubscriptionUpdate};
use shared_config::AppConfig;

use crate::models::{find_package, PaymentError, StripeEvent, WebhookOutcome};
use crate::services::CheckoutService;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed webhook, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Check a `t=<unix>,v1=<hex>` signature header against `payload`.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str, now: i64) -> anyhow::Result<()> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value.parse::<i64>().context("timestamp is not a number")?),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.context("missing timestamp")?;
    if signatures.is_empty() {
        bail!("missing v1 signature");
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        bail!("timestamp outside the {}s tolerance", SIGNATURE_TOLERANCE_SECS);
    }

    let mut signed = format!("{}.", timestamp).into_bytes();
    signed.extend_from_slice(payload);

    for signature in signatures {
        let Ok(expected) = hex::decode(signature) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).context("unusable webhook secret")?;
        mac.update(&signed);
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }

    bail!("no signature matches the payload")
}

fn str_at<'a>(object: &'a Value, pointer: &str) -> Option<&'a str> {
    object.pointer(pointer).and_then(Value::as_str)
}

pub struct WebhookService {
    webhook_secret: String,
    checkout: CheckoutService,
    patients: PatientService,
}

impl WebhookService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            webhook_secret: config.stripe_webhook_secret.clone(),
            checkout: CheckoutService::new(config),
            patients: PatientService::new(config),
        }
    }

    pub async fn handle(&self, payload: &[u8], signature: Option<&str>) -> Result<WebhookOutcome, PaymentError> {
        let verified = if self.webhook_secret.is_empty() {
            warn!("Webhook secret not configured, acknowledging event without processing");
            false
        } else {
            let header = signature.ok_or_else(|| PaymentError::InvalidSignature("missing signature header".to_string()))?;
            verify_signature(payload, header, &self.webhook_secret, Utc::now().timestamp())
                .map_err(|e| PaymentError::InvalidSignature(e.to_string()))?;
            true
        };

        let event: StripeEvent =
            serde_json::from_slice(payload).map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;
        debug!("Webhook event {} ({})", event.id, event.event_type);

        let processed = if !verified {
            false
        } else {
            match event.event_type.as_str() {
                "checkout.session.completed" => self.checkout_completed(&event.data.object).await?,
                "customer.subscription.updated" => self.subscription_changed(&event.data.object, false).await?,
                "customer.subscription.deleted" => self.subscription_changed(&event.data.object, true).await?,
                other => {
                    debug!("Ignoring webhook event type {}", other);
                    false
                }
            }
        };

        Ok(WebhookOutcome {
            event_id: event.id,
            event_type: event.event_type,
            processed,
        })
    }

    async fn checkout_completed(&self, session: &Value) -> Result<bool, PaymentError> {
        if str_at(session, "/payment_status") != Some("paid") {
            info!("Checkout session not paid yet, skipping");
            return Ok(false);
        }

        let session_id = str_at(session, "/id").ok_or_else(|| PaymentError::InvalidPayload("session id missing".to_string()))?;
        let user_id = str_at(session, "/metadata/user_id")
            .ok_or_else(|| PaymentError::InvalidPayload("metadata.user_id missing".to_string()))?;
        let package_id = str_at(session, "/metadata/package_id")
            .ok_or_else(|| PaymentError::InvalidPayload("metadata.package_id missing".to_string()))?;
        let package = find_package(package_id).ok_or_else(|| PaymentError::UnknownPackage(package_id.to_string()))?;

        let amount_cents = session
            .get("amount_total")
            .and_then(Value::as_i64)
            .unwrap_or(package.amount_cents);
        let email = str_at(session, "/customer_details/email")
            .or_else(|| str_at(session, "/customer_email"))
            .map(String::from);

        if let Some(customer) = str_at(session, "/customer") {
            let update = SubscriptionUpdate {
                stripe_customer_id: Some(customer.to_string()),
                ..SubscriptionUpdate::default()
            };
            self.patients.apply_subscription(user_id, update).await?;
        }

        self.checkout
            .grant_purchase(user_id, email, &package, session_id, amount_cents)
            .await
    }

    async fn subscription_changed(&self, subscription: &Value, deleted: bool) -> Result<bool, PaymentError> {
        let customer = str_at(subscription, "/customer");

        let user_id = match (str_at(subscription, "/metadata/user_id"), customer) {
            (Some(user_id), _) => Some(user_id.to_string()),
            (None, Some(customer)) => self
                .patients
                .find_by_stripe_customer(customer)
                .await?
                .map(|patient| patient.user_id),
            (None, None) => None,
        };
        let Some(user_id) = user_id else {
            warn!("Subscription event for unknown customer {:?}", customer);
            return Ok(false);
        };

        let update = if deleted {
            SubscriptionUpdate {
                subscription_plan: Some("free".to_string()),
                subscription_status: Some("canceled".to_string()),
                stripe_customer_id: customer.map(String::from),
            }
        } else {
            let plan = str_at(subscription, "/items/data/0/price/lookup_key")
                .or_else(|| str_at(subscription, "/items/data/0/price/nickname"))
                .or_else(|| str_at(subscription, "/metadata/plan"));
            SubscriptionUpdate {
                subscription_plan: plan.map(String::from),
                subscription_status: str_at(subscription, "/status").map(String::from),
                stripe_customer_id: customer.map(String::from),
            }
        };

        self.patients.apply_subscription(&user_id, update).await?;
        info!("Subscription for {} synced (deleted: {})", user_id, deleted);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.", timestamp).as_bytes());
        mac.update(payload);
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn accepts_valid_signature() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(payload, "whsec_test", 1_700_000_000);
        assert!(verify_signature(payload, &header, "whsec_test", 1_700_000_100).is_ok());
    }

    #[test]
    fn rejects_tampered_payload_and_wrong_secret() {
        let header = sign(br#"{"id":"evt_1"}"#, "whsec_test", 1_700_000_000);
        assert!(verify_signature(br#"{"id":"evt_2"}"#, &header, "whsec_test", 1_700_000_000).is_err());
        assert!(verify_signature(br#"{"id":"evt_1"}"#, &header, "whsec_other", 1_700_000_000).is_err());
    }

    #[test]
    fn rejects_stale_timestamps() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(payload, "whsec_test", 1_700_000_000);
        let err = verify_signature(payload, &header, "whsec_test", 1_700_000_000 + SIGNATURE_TOLERANCE_SECS + 1)
            .unwrap_err();
        assert!(err.to_string().contains("tolerance"));
    }

    #[test]
    fn any_matching_v1_entry_is_enough() {
        let payload = br#"{"id":"evt_1"}"#;
        let valid = sign(payload, "whsec_test", 1_700_000_000);
        let header = format!("t=1700000000,v1=deadbeef,{}", valid.split_once(',').unwrap().1);
        assert!(verify_signature(payload, &header, "whsec_test", 1_700_000_000).is_ok());
        assert!(verify_signature(payload, "v1=abc", "whsec_test", 1_700_000_000).is_err());
    }
}
