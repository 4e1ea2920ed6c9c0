use tracing::{info, warn};
use uuid::Uuid;

use notification_cell::{NotificationKind, NotificationRequest, NotificationService};
use patient_cell::{CreditAdjustment, CreditService, TransactionKind};
use shared_config::AppConfig;
use shared_models::auth::User;

use crate::models::{find_package, CheckoutResponse, CreditPackage, PaymentError};
use crate::services::StripeClient;

pub struct CheckoutService {
    stripe: Option<StripeClient>,
    credits: CreditService,
    notifications: NotificationService,
}

impl CheckoutService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            stripe: StripeClient::from_config(config),
            credits: CreditService::new(config),
            notifications: NotificationService::new(config),
        }
    }

    /// Start a hosted checkout for `package_id`. Without a processor the
    /// credits are granted on the spot.
    pub async fn create_checkout(&self, patient: &User, package_id: &str) -> Result<CheckoutResponse, PaymentError> {
        let package = find_package(package_id).ok_or_else(|| PaymentError::UnknownPackage(package_id.to_string()))?;

        let Some(stripe) = &self.stripe else {
            warn!("Payments not configured, granting {} credits to {} directly", package.credits, patient.id);
            let session_id = format!("demo_cs_{}", Uuid::new_v4().simple());
            self.grant_purchase(&patient.id, patient.email.clone(), &package, &session_id, package.amount_cents)
                .await?;
            return Ok(CheckoutResponse {
                session_id,
                url: None,
                package,
                demo: true,
            });
        };

        let session = stripe
            .create_checkout_session(&patient.id, patient.email.as_deref(), &package)
            .await?;

        Ok(CheckoutResponse {
            session_id: session.id,
            url: session.url,
            package,
            demo: false,
        })
    }

    /// Credit a completed purchase once per checkout session and tell the patient.
    /// Returns `false` when the session was already credited.
    pub async fn grant_purchase(
        &self,
        user_id: &str,
        email: Option<String>,
        package: &CreditPackage,
        session_id: &str,
        amount_cents: i64,
    ) -> Result<bool, PaymentError> {
        if self.credits.has_transaction(session_id, TransactionKind::Purchase).await? {
            info!("Checkout session {} already credited", session_id);
            return Ok(false);
        }

        let patient = self
            .credits
            .adjust_credits(CreditAdjustment {
                user_id: user_id.to_string(),
                delta: package.credits,
                kind: TransactionKind::Purchase,
                description: format!("{} credit package", package.name),
                reference_id: Some(session_id.to_string()),
                amount_cents: Some(amount_cents),
            })
            .await?;

        info!("{} credits purchased by {} (balance {})", package.credits, user_id, patient.credits);

        self.notifications
            .notify(
                NotificationRequest::new(
                    user_id,
                    NotificationKind::CreditsPurchased,
                    "Credits added",
                    format!(
                        "{} credits were added to your account. Your balance is now {}.",
                        package.credits, patient.credits
                    ),
                )
                .with_email(email)
                .with_link("/payments"),
            )
            .await;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_utils::test_utils::{TestConfig, TestUser};

    #[tokio::test]
    async fn demo_checkout_grants_credits() {
        let service = CheckoutService::new(&TestConfig::demo());
        let patient = TestUser::patient("p@example.com").to_user();

        let response = service.create_checkout(&patient, "starter").await.unwrap();
        assert!(response.demo);
        assert!(response.session_id.starts_with("demo_cs_"));
        assert_eq!(response.package.credits, 5);
    }

    #[tokio::test]
    async fn unknown_package_is_rejected() {
        let service = CheckoutService::new(&TestConfig::demo());
        let patient = TestUser::patient("p@example.com").to_user();
        assert_matches!(
            service.create_checkout(&patient, "gold").await,
            Err(PaymentError::UnknownPackage(_))
        );
    }
}
