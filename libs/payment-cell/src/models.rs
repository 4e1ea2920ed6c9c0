use serde::{Deserialize, Serialize};
use serde_json::Value;

use patient_cell::{PatientError, TransactionKind};
use shared_database::DatabaseError;
use shared_models::error::AppError;

pub const DOCTOR_EARNING_PER_CREDIT_CENTS: i64 = 800;
pub const PLATFORM_FEE_PERCENT: i64 = 0;

/// Credits sold in a single checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreditPackage {
    pub id: String,
    pub name: String,
    pub credits: i64,
    pub amount_cents: i64,
    pub currency: String,
}

impl CreditPackage {
    fn new(id: &str, name: &str, credits: i64, amount_cents: i64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            credits,
            amount_cents,
            currency: "usd".to_string(),
        }
    }
}

pub fn credit_packages() -> Vec<CreditPackage> {
    vec![
        CreditPackage::new("starter", "Starter", 5, 4900),
        CreditPackage::new("standard", "Standard", 10, 8900),
        CreditPackage::new("premium", "Premium", 25, 19900),
    ]
}

pub fn find_package(package_id: &str) -> Option<CreditPackage> {
    credit_packages().into_iter().find(|p| p.id == package_id)
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub package_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
    pub package: CreditPackage,
    /// Set when no payment processor is configured and credits were granted directly.
    pub demo: bool,
}

/// The subset of a processor event this service acts on.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookOutcome {
    pub event_id: String,
    pub event_type: String,
    pub processed: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionQuery {
    pub kind: Option<TransactionKind>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EarningsSummary {
    pub completed_consultations: usize,
    pub credits_earned: i64,
    pub per_credit_cents: i64,
    pub gross_cents: i64,
    pub platform_fee_percent: i64,
    pub platform_fee_cents: i64,
    pub net_cents: i64,
    pub currency: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Unknown credit package: {0}")]
    UnknownPackage(String),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Payment processor error: {0}")]
    Processor(String),

    #[error(transparent)]
    Patient(#[from] PatientError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::UnknownPackage(_) => AppError::NotFound(err.to_string()),
            PaymentError::InvalidSignature(_) | PaymentError::InvalidPayload(_) => AppError::BadRequest(err.to_string()),
            PaymentError::Processor(msg) => AppError::ExternalService(msg),
            PaymentError::Patient(e) => e.into(),
            PaymentError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_catalogue() {
        let premium = find_package("premium").unwrap();
        assert_eq!((premium.credits, premium.amount_cents), (25, 19900));
        assert_eq!(credit_packages().len(), 3);
        assert!(find_package("platinum").is_none());
    }
}
