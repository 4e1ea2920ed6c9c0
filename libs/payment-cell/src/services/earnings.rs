use patient_cell::{CreditService, TransactionKind};
use shared_config::AppConfig;

use crate::models::{EarningsSummary, PaymentError, DOCTOR_EARNING_PER_CREDIT_CENTS, PLATFORM_FEE_PERCENT};

pub struct EarningsService {
    credits: CreditService,
}

impl EarningsService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            credits: CreditService::new(config),
        }
    }

    pub async fn summary(&self, doctor_id: &str) -> Result<EarningsSummary, PaymentError> {
        let earnings = self
            .credits
            .list_transactions(doctor_id, Some(TransactionKind::ConsultationEarning), 500)
            .await?;

        let credits: i64 = earnings.iter().map(|t| t.credits).sum();
        Ok(summarize(earnings.len(), credits))
    }
}

pub fn summarize(completed_consultations: usize, credits_earned: i64) -> EarningsSummary {
    let gross_cents = credits_earned * DOCTOR_EARNING_PER_CREDIT_CENTS;
    let platform_fee_cents = gross_cents * PLATFORM_FEE_PERCENT / 100;

    EarningsSummary {
        completed_consultations,
        credits_earned,
        per_credit_cents: DOCTOR_EARNING_PER_CREDIT_CENTS,
        gross_cents,
        platform_fee_percent: PLATFORM_FEE_PERCENT,
        platform_fee_cents,
        net_cents: gross_cents - platform_fee_cents,
        currency: "usd".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_equals_gross_without_fee() {
        let summary = summarize(3, 6);
        assert_eq!(summary.gross_cents, 4800);
        assert_eq!(summary.net_cents, 4800);
        assert_eq!(summary.platform_fee_cents, 0);
    }
}
