use tracing::{info, warn};
use uuid::Uuid;

use doctor_cell::{
    ApplicationService, ApplicationStatus, Doctor, DoctorApplication, DoctorError, DoctorService,
    ReviewApplicationRequest, ReviewDecision, VerificationStatus,
};
use notification_cell::{NotificationKind, NotificationRequest, NotificationService};
use shared_config::AppConfig;
use shared_models::auth::User;

use crate::models::{AdminError, UpdateVerificationRequest};

/// Doctor application review and verification status management.
pub struct ReviewService {
    applications: ApplicationService,
    doctors: DoctorService,
    notifications: NotificationService,
}

impl ReviewService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            applications: ApplicationService::new(config),
            doctors: DoctorService::new(config),
            notifications: NotificationService::new(config),
        }
    }

    pub async fn list_applications(&self, status: Option<ApplicationStatus>) -> Result<Vec<DoctorApplication>, AdminError> {
        Ok(self.applications.list(status).await?)
    }

    pub async fn list_pending_doctors(&self) -> Result<Vec<Doctor>, AdminError> {
        Ok(self.doctors.list_by_status(VerificationStatus::Pending).await?)
    }

    /// Record the decision, then move the applicant's doctor profile to the
    /// matching verification status.
    pub async fn review_application(
        &self,
        admin: &User,
        application_id: Uuid,
        request: ReviewApplicationRequest,
    ) -> Result<(DoctorApplication, Option<Doctor>), AdminError> {
        let decision = request.decision;
        let notes = request.notes.clone();
        let application = self.applications.review(application_id, &admin.id, request).await?;

        let doctor = match self
            .doctors
            .set_verification_status(&application.user_id, decision.verification_status())
            .await
        {
            Ok(doctor) => Some(doctor),
            Err(DoctorError::NotFound) => {
                warn!("Applicant {} has no doctor profile to update", application.user_id);
                None
            }
            Err(e) => return Err(e.into()),
        };

        info!("Admin {} reviewed application {}: {}", admin.id, application_id, application.status);

        let (title, mut message) = match decision {
            ReviewDecision::Approve => (
                "Application approved",
                "Your doctor application was approved. Patients can now book consultations with you.".to_string(),
            ),
            ReviewDecision::Reject => ("Application rejected", "Your doctor application was not approved.".to_string()),
        };
        if let Some(notes) = notes.filter(|n| !n.trim().is_empty()) {
            message.push_str(&format!(" Reviewer notes: {}", notes));
        }
        self.notifications
            .notify(
                NotificationRequest::new(&application.user_id, NotificationKind::ApplicationReviewed, title, message)
                    .with_email(doctor.as_ref().and_then(|d| d.email.clone()))
                    .with_link("/doctor/applications"),
            )
            .await;

        Ok((application, doctor))
    }

    pub async fn set_verification(
        &self,
        admin: &User,
        doctor_user_id: &str,
        request: UpdateVerificationRequest,
    ) -> Result<Doctor, AdminError> {
        let doctor = self
            .doctors
            .set_verification_status(doctor_user_id, request.status)
            .await?;

        info!("Admin {} set doctor {} verification to {}", admin.id, doctor_user_id, request.status);

        let mut message = format!("Your verification status is now {}.", request.status);
        if let Some(notes) = request.notes.filter(|n| !n.trim().is_empty()) {
            message.push_str(&format!(" Notes: {}", notes));
        }
        self.notifications
            .notify(
                NotificationRequest::new(
                    doctor_user_id,
                    NotificationKind::VerificationUpdated,
                    "Verification status updated",
                    message,
                )
                .with_email(doctor.email.clone()),
            )
            .await;

        Ok(doctor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_utils::test_utils::{TestConfig, TestUser};

    #[tokio::test]
    async fn demo_approval_verifies_doctor() {
        let service = ReviewService::new(&TestConfig::demo());
        let admin = TestUser::admin("admin@example.com").to_user();
        let request = ReviewApplicationRequest {
            decision: ReviewDecision::Approve,
            notes: Some("License checked".to_string()),
        };

        let (application, doctor) = tokio_test::assert_ok!(service.review_application(&admin, Uuid::new_v4(), request).await);
        assert_eq!(application.status, ApplicationStatus::Approved);
        assert_eq!(application.review_history.last().map(|r| r.reviewer_id.as_str()), Some(admin.id.as_str()));
        assert_eq!(doctor.map(|d| d.verification_status), Some(VerificationStatus::Verified));
    }
}
