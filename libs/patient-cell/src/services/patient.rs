use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{eq, DatabaseClient};
use shared_utils::validation::{parse_date, validate_phone};

use crate::models::{Patient, PatientError, SubscriptionUpdate, Transaction, TransactionKind, UpdatePatientRequest};
use crate::services::credits::CreditService;

pub(crate) const TABLE: &str = "patients";
pub(crate) const DEMO_CREDITS: i64 = 10;

pub struct PatientService {
    db: DatabaseClient,
    initial_credits: i64,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: DatabaseClient::new(config),
            initial_credits: config.initial_patient_credits,
        }
    }

    pub async fn find_by_user(&self, user_id: &str) -> Result<Option<Patient>, PatientError> {
        if !self.db.is_configured() {
            return Ok(Some(demo_patient(user_id, DEMO_CREDITS)));
        }

        Ok(self.db.select_one(TABLE, &format!("user_id={}", eq(user_id))).await?)
    }

    pub async fn get_by_user(&self, user_id: &str) -> Result<Patient, PatientError> {
        self.find_by_user(user_id).await?.ok_or(PatientError::NotFound)
    }

    pub async fn find_by_stripe_customer(&self, customer_id: &str) -> Result<Option<Patient>, PatientError> {
        if !self.db.is_configured() {
            return Ok(None);
        }

        Ok(self
            .db
            .select_one(TABLE, &format!("stripe_customer_id={}", eq(customer_id)))
            .await?)
    }

    /// Create the patient profile with the onboarding credit grant.
    pub async fn create_for_user(&self, user_id: &str, credit_service: &CreditService) -> Result<Patient, PatientError> {
        debug!("Creating patient profile for {}", user_id);

        if !self.db.is_configured() {
            return Ok(demo_patient(user_id, self.initial_credits));
        }

        if self.find_by_user(user_id).await?.is_some() {
            return Err(PatientError::AlreadyExists);
        }

        let now = Utc::now().to_rfc3339();
        let patient: Patient = self
            .db
            .insert(
                TABLE,
                json!({
                    "user_id": user_id,
                    "credits": self.initial_credits,
                    "subscription_plan": "free",
                    "subscription_status": null,
                    "stripe_customer_id": null,
                    "date_of_birth": null,
                    "phone": null,
                    "created_at": now,
                    "updated_at": now,
                }),
            )
            .await?;

        if self.initial_credits > 0 {
            credit_service
                .record_transaction(
                    user_id,
                    TransactionKind::InitialGrant,
                    self.initial_credits,
                    "Welcome credits",
                    None,
                    None,
                )
                .await?;
        }

        info!("Patient profile {} created with {} credits", patient.id, patient.credits);
        Ok(patient)
    }

    pub async fn update_profile(&self, user_id: &str, request: UpdatePatientRequest) -> Result<Patient, PatientError> {
        let mut changes = Map::new();

        if let Some(phone) = request.phone {
            validate_phone(&phone).map_err(|e| PatientError::ValidationError(e.message().to_string()))?;
            changes.insert("phone".to_string(), json!(phone));
        }
        if let Some(date_of_birth) = request.date_of_birth {
            let dob = parse_date("date_of_birth", &date_of_birth)
                .map_err(|e| PatientError::ValidationError(e.message().to_string()))?;
            if dob > Utc::now().date_naive() {
                return Err(PatientError::ValidationError("date_of_birth cannot be in the future".to_string()));
            }
            changes.insert("date_of_birth".to_string(), json!(dob));
        }

        if changes.is_empty() {
            return Err(PatientError::ValidationError("No fields to update".to_string()));
        }

        if !self.db.is_configured() {
            let mut patient = demo_patient(user_id, DEMO_CREDITS);
            if let Some(phone) = changes.get("phone").and_then(Value::as_str) {
                patient.phone = Some(phone.to_string());
            }
            return Ok(patient);
        }

        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let mut updated: Vec<Patient> = self
            .db
            .update(TABLE, &format!("user_id={}", eq(user_id)), Value::Object(changes))
            .await?;

        if updated.is_empty() {
            return Err(PatientError::NotFound);
        }
        Ok(updated.remove(0))
    }

    pub async fn apply_subscription(&self, user_id: &str, update: SubscriptionUpdate) -> Result<Patient, PatientError> {
        if !self.db.is_configured() {
            let mut patient = demo_patient(user_id, DEMO_CREDITS);
            patient.subscription_plan = update.subscription_plan;
            patient.subscription_status = update.subscription_status;
            return Ok(patient);
        }

        let mut changes = Map::new();
        if let Some(plan) = update.subscription_plan {
            changes.insert("subscription_plan".to_string(), json!(plan));
        }
        if let Some(status) = update.subscription_status {
            changes.insert("subscription_status".to_string(), json!(status));
        }
        if let Some(customer) = update.stripe_customer_id {
            changes.insert("stripe_customer_id".to_string(), json!(customer));
        }
        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let mut updated: Vec<Patient> = self
            .db
            .update(TABLE, &format!("user_id={}", eq(user_id)), Value::Object(changes))
            .await?;

        if updated.is_empty() {
            return Err(PatientError::NotFound);
        }
        info!("Subscription updated for patient {}", user_id);
        Ok(updated.remove(0))
    }
}

pub(crate) fn demo_patient(user_id: &str, credits: i64) -> Patient {
    let now = Utc::now();
    Patient {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        credits,
        subscription_plan: Some("free".to_string()),
        subscription_status: None,
        stripe_customer_id: None,
        date_of_birth: None,
        phone: None,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn demo_transaction(user_id: &str, kind: TransactionKind, credits: i64, description: &str) -> Transaction {
    Transaction {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        kind,
        credits,
        amount_cents: None,
        currency: None,
        description: description.to_string(),
        reference_id: None,
        created_at: Utc::now(),
    }
}
