use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub user_id: String,
    pub credits: i64,
    pub subscription_plan: Option<String>,
    pub subscription_status: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn has_active_subscription(&self) -> bool {
        matches!(self.subscription_status.as_deref(), Some("active") | Some("trialing"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePatientRequest {
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
}

/// Subscription fields mirrored from the payment processor.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SubscriptionUpdate {
    pub subscription_plan: Option<String>,
    pub subscription_status: Option<String>,
    pub stripe_customer_id: Option<String>,
}

/// Credit or monetary ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: String,
    pub kind: TransactionKind,
    /// Signed credit movement for the user.
    pub credits: i64,
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
    pub description: String,
    pub reference_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    InitialGrant,
    Purchase,
    AppointmentDebit,
    AppointmentRefund,
    ConsultationEarning,
    Adjustment,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransactionKind::InitialGrant => "initial_grant",
            TransactionKind::Purchase => "purchase",
            TransactionKind::AppointmentDebit => "appointment_debit",
            TransactionKind::AppointmentRefund => "appointment_refund",
            TransactionKind::ConsultationEarning => "consultation_earning",
            TransactionKind::Adjustment => "adjustment",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("Patient profile not found")]
    NotFound,

    #[error("Patient profile already exists")]
    AlreadyExists,

    #[error("Insufficient credits: {available} available, {required} required")]
    InsufficientCredits { available: i64, required: i64 },

    #[error("Credit balance changed concurrently, please retry")]
    ConcurrentUpdate,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound => AppError::NotFound(err.to_string()),
            PatientError::AlreadyExists
            | PatientError::InsufficientCredits { .. }
            | PatientError::ConcurrentUpdate => AppError::Conflict(err.to_string()),
            PatientError::ValidationError(msg) => AppError::ValidationError(msg),
            PatientError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
