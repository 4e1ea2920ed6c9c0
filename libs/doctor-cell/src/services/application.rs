use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{eq, DatabaseClient};
use shared_utils::validation::{require_max_length, require_non_empty};

use crate::models::{
    ApplicationStatus, CreateApplicationRequest, DoctorApplication, DoctorError, ReviewApplicationRequest, ReviewEntry,
};

const TABLE: &str = "doctor_applications";

pub struct ApplicationService {
    db: DatabaseClient,
}

impl ApplicationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: DatabaseClient::new(config),
        }
    }

    /// Submit credentials for review. A user may only have one pending application.
    pub async fn submit(&self, user_id: &str, request: CreateApplicationRequest) -> Result<DoctorApplication, DoctorError> {
        validate_application(&request)?;

        if !self.db.is_configured() {
            return Ok(demo_application(user_id, &request));
        }

        let pending = format!("user_id={}&status=eq.pending", eq(user_id));
        if self.db.count(TABLE, &pending).await? > 0 {
            return Err(DoctorError::PendingApplicationExists);
        }

        let now = Utc::now().to_rfc3339();
        let application: DoctorApplication = self
            .db
            .insert(
                TABLE,
                json!({
                    "user_id": user_id,
                    "specialty": request.specialty,
                    "license_number": request.license_number,
                    "years_experience": request.years_experience,
                    "credentials_url": request.credentials_url,
                    "documents": request.documents,
                    "status": ApplicationStatus::Pending,
                    "review_history": [],
                    "submitted_at": now,
                    "updated_at": now,
                }),
            )
            .await?;

        info!("Doctor application {} submitted by {}", application.id, user_id);
        Ok(application)
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<DoctorApplication>, DoctorError> {
        if !self.db.is_configured() {
            return Ok(Vec::new());
        }

        let query = format!("user_id={}&order=submitted_at.desc", eq(user_id));
        Ok(self.db.select(TABLE, &query).await?)
    }

    pub async fn list(&self, status: Option<ApplicationStatus>) -> Result<Vec<DoctorApplication>, DoctorError> {
        if !self.db.is_configured() {
            return Ok(Vec::new());
        }

        let mut query = "order=submitted_at.asc".to_string();
        if let Some(status) = status {
            query.push_str(&format!("&status=eq.{}", status));
        }
        Ok(self.db.select(TABLE, &query).await?)
    }

    pub async fn get(&self, application_id: Uuid) -> Result<DoctorApplication, DoctorError> {
        self.db
            .select_one(TABLE, &format!("id={}", eq(application_id.to_string())))
            .await?
            .ok_or(DoctorError::ApplicationNotFound)
    }

    /// Record an admin decision. Only pending applications can be reviewed;
    /// the decision is appended to the review history.
    pub async fn review(
        &self,
        application_id: Uuid,
        reviewer_id: &str,
        request: ReviewApplicationRequest,
    ) -> Result<DoctorApplication, DoctorError> {
        debug!("Reviewing application {} by {}", application_id, reviewer_id);

        if let Some(notes) = &request.notes {
            require_max_length("notes", notes, 2000).map_err(validation)?;
        }

        let entry = ReviewEntry {
            reviewer_id: reviewer_id.to_string(),
            decision: request.decision.application_status(),
            notes: request.notes,
            reviewed_at: Utc::now(),
        };

        if !self.db.is_configured() {
            let mut application = demo_application(
                "demo_applicant",
                &CreateApplicationRequest {
                    specialty: "General Practice".to_string(),
                    license_number: "DEMO-0001".to_string(),
                    years_experience: None,
                    credentials_url: None,
                    documents: Vec::new(),
                },
            );
            application.id = application_id;
            application.status = entry.decision;
            application.review_history.push(entry);
            return Ok(application);
        }

        let application = self.get(application_id).await?;
        if application.status != ApplicationStatus::Pending {
            return Err(DoctorError::ApplicationAlreadyReviewed);
        }

        let mut history = application.review_history;
        let status = entry.decision;
        history.push(entry);

        // A concurrent review leaves no pending row to update.
        let filter = format!("id={}&status=eq.pending", eq(application_id.to_string()));
        let mut updated: Vec<DoctorApplication> = self
            .db
            .update(
                TABLE,
                &filter,
                json!({
                    "status": status,
                    "review_history": history,
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        if updated.is_empty() {
            return Err(DoctorError::ApplicationAlreadyReviewed);
        }

        info!("Application {} {} by {}", application_id, status, reviewer_id);
        Ok(updated.remove(0))
    }
}

fn validate_application(request: &CreateApplicationRequest) -> Result<(), DoctorError> {
    require_non_empty("specialty", &request.specialty).map_err(validation)?;
    require_max_length("specialty", &request.specialty, 100).map_err(validation)?;
    require_non_empty("license_number", &request.license_number).map_err(validation)?;
    require_max_length("license_number", &request.license_number, 50).map_err(validation)?;

    if let Some(years) = request.years_experience {
        if !(0..=80).contains(&years) {
            return Err(DoctorError::ValidationError("years_experience must be between 0 and 80".to_string()));
        }
    }
    for document in &request.documents {
        require_non_empty("document name", &document.name).map_err(validation)?;
        if !document.url.starts_with("https://") {
            return Err(DoctorError::ValidationError(format!("Document {} must use an https URL", document.name)));
        }
    }
    Ok(())
}

fn validation(err: shared_models::error::AppError) -> DoctorError {
    DoctorError::ValidationError(err.message().to_string())
}

fn demo_application(user_id: &str, request: &CreateApplicationRequest) -> DoctorApplication {
    let now = Utc::now();
    DoctorApplication {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        specialty: request.specialty.clone(),
        license_number: request.license_number.clone(),
        years_experience: request.years_experience,
        credentials_url: request.credentials_url.clone(),
        documents: request.documents.clone(),
        status: ApplicationStatus::Pending,
        review_history: Vec::new(),
        submitted_at: now,
        updated_at: now,
    }
}
