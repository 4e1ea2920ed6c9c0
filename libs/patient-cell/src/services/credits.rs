use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;
use shared_database::{eq, DatabaseClient};

use crate::models::{Patient, PatientError, Transaction, TransactionKind};
use crate::services::patient::{demo_patient, demo_transaction, DEMO_CREDITS, TABLE as PATIENTS};

const TRANSACTIONS: &str = "transactions";
const MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct CreditAdjustment {
    pub user_id: String,
    /// Positive grants credits, negative spends them.
    pub delta: i64,
    pub kind: TransactionKind,
    pub description: String,
    pub reference_id: Option<String>,
    pub amount_cents: Option<i64>,
}

/// Patient credit balance plus the transaction ledger behind it.
pub struct CreditService {
    db: DatabaseClient,
}

impl CreditService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: DatabaseClient::new(config),
        }
    }

    /// Apply `adjustment` to the patient's balance and record it in the ledger.
    ///
    /// The balance never goes below zero. The ledger entry is written first
    /// and removed again if the balance cannot be moved, so a balance change
    /// always has a matching entry. The balance write is conditional on the
    /// value read beforehand; a lost race re-reads and tries again, three
    /// attempts in all, before failing with [`PatientError::ConcurrentUpdate`].
    pub async fn adjust_credits(&self, adjustment: CreditAdjustment) -> Result<Patient, PatientError> {
        debug!(
            "Adjusting credits for {} by {} ({})",
            adjustment.user_id, adjustment.delta, adjustment.kind
        );

        if !self.db.is_configured() {
            let balance = checked_balance(DEMO_CREDITS, adjustment.delta)?;
            return Ok(demo_patient(&adjustment.user_id, balance));
        }

        let patient = self.load(&adjustment.user_id).await?;
        checked_balance(patient.credits, adjustment.delta)?;

        let entry = self
            .record_transaction(
                &adjustment.user_id,
                adjustment.kind,
                adjustment.delta,
                &adjustment.description,
                adjustment.reference_id.as_deref(),
                adjustment.amount_cents,
            )
            .await?;

        match self.move_balance(patient, &adjustment).await {
            Ok(updated) => Ok(updated),
            Err(e) => {
                self.discard_transaction(&entry).await;
                Err(e)
            }
        }
    }

    async fn load(&self, user_id: &str) -> Result<Patient, PatientError> {
        self.db
            .select_one(PATIENTS, &format!("user_id={}", eq(user_id)))
            .await?
            .ok_or(PatientError::NotFound)
    }

    async fn move_balance(&self, mut patient: Patient, adjustment: &CreditAdjustment) -> Result<Patient, PatientError> {
        let mut attempt = 1;
        loop {
            let balance = checked_balance(patient.credits, adjustment.delta)?;
            let filter = format!(
                "user_id={}&credits=eq.{}",
                eq(&adjustment.user_id),
                patient.credits
            );
            let mut updated: Vec<Patient> = self
                .db
                .update(
                    PATIENTS,
                    &filter,
                    json!({ "credits": balance, "updated_at": Utc::now().to_rfc3339() }),
                )
                .await?;

            if !updated.is_empty() {
                info!(
                    "Credits for {} moved {} -> {}",
                    adjustment.user_id, patient.credits, balance
                );
                return Ok(updated.remove(0));
            }

            if attempt == MAX_ATTEMPTS {
                warn!(
                    "Credit balance for {} kept changing, giving up after {} attempts",
                    adjustment.user_id, attempt
                );
                return Err(PatientError::ConcurrentUpdate);
            }

            debug!("Credit balance for {} changed during adjustment, re-reading", adjustment.user_id);
            attempt += 1;
            patient = self.load(&adjustment.user_id).await?;
        }
    }

    async fn discard_transaction(&self, entry: &Transaction) {
        let filter = format!("id={}", eq(entry.id.to_string()));
        match self.db.delete(TRANSACTIONS, &filter).await {
            Ok(()) => debug!("Discarded ledger entry {} for {}", entry.id, entry.user_id),
            Err(e) => error!(
                "Ledger entry {} for {} has no matching balance change and could not be removed: {}",
                entry.id, entry.user_id, e
            ),
        }
    }

    pub async fn record_transaction(
        &self,
        user_id: &str,
        kind: TransactionKind,
        credits: i64,
        description: &str,
        reference_id: Option<&str>,
        amount_cents: Option<i64>,
    ) -> Result<Transaction, PatientError> {
        if !self.db.is_configured() {
            return Ok(demo_transaction(user_id, kind, credits, description));
        }

        let transaction = self
            .db
            .insert(
                TRANSACTIONS,
                json!({
                    "user_id": user_id,
                    "kind": kind,
                    "credits": credits,
                    "amount_cents": amount_cents,
                    "currency": amount_cents.map(|_| "usd"),
                    "description": description,
                    "reference_id": reference_id,
                    "created_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        Ok(transaction)
    }

    /// Whether a ledger entry of `kind` already references `reference_id`.
    pub async fn has_transaction(&self, reference_id: &str, kind: TransactionKind) -> Result<bool, PatientError> {
        if !self.db.is_configured() {
            return Ok(false);
        }

        let query = format!("reference_id={}&kind=eq.{}&select=id", eq(reference_id), kind);
        let existing: Vec<serde_json::Value> = self.db.select(TRANSACTIONS, &query).await?;
        Ok(!existing.is_empty())
    }

    pub async fn list_transactions(
        &self,
        user_id: &str,
        kind: Option<TransactionKind>,
        limit: u32,
    ) -> Result<Vec<Transaction>, PatientError> {
        if !self.db.is_configured() {
            return Ok(vec![demo_transaction(
                user_id,
                kind.unwrap_or(TransactionKind::InitialGrant),
                DEMO_CREDITS,
                "Demo ledger entry",
            )]);
        }

        let mut query = format!("user_id={}&order=created_at.desc&limit={}", eq(user_id), limit.clamp(1, 500));
        if let Some(kind) = kind {
            query.push_str(&format!("&kind=eq.{}", kind));
        }

        Ok(self.db.select(TRANSACTIONS, &query).await?)
    }
}

fn checked_balance(current: i64, delta: i64) -> Result<i64, PatientError> {
    let balance = current + delta;
    if balance < 0 {
        return Err(PatientError::InsufficientCredits {
            available: current,
            required: -delta,
        });
    }
    Ok(balance)
}
