use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::AppError;
pub use shared_utils::timezone::AvailabilitySlot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    /// Identity-provider user id; doubles as the doctor's public id.
    pub user_id: String,
    pub name: String,
    pub email: Option<String>,
    pub specialty: String,
    pub license_number: Option<String>,
    pub years_experience: Option<i32>,
    pub bio: Option<String>,
    pub timezone: String,
    pub verification_status: VerificationStatus,
    /// Weekly windows, stored in UTC.
    #[serde(default)]
    pub availability: Vec<AvailabilitySlot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn is_verified(&self) -> bool {
        self.verification_status == VerificationStatus::Verified
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
    Suspended,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Rejected => "rejected",
            VerificationStatus::Suspended => "suspended",
        };
        write!(f, "{}", label)
    }
}

impl FromStr for VerificationStatus {
    type Err = DoctorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(VerificationStatus::Pending),
            "verified" => Ok(VerificationStatus::Verified),
            "rejected" => Ok(VerificationStatus::Rejected),
            "suspended" => Ok(VerificationStatus::Suspended),
            other => Err(DoctorError::ValidationError(format!("Unknown verification status: {}", other))),
        }
    }
}

/// Profile fields captured when a user onboards as a doctor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateDoctorProfile {
    pub name: String,
    pub email: Option<String>,
    pub specialty: String,
    pub license_number: Option<String>,
    pub years_experience: Option<i32>,
    pub bio: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub name: Option<String>,
    pub specialty: Option<String>,
    pub bio: Option<String>,
    pub years_experience: Option<i32>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorSearchQuery {
    pub specialty: Option<String>,
    pub limit: Option<u32>,
}

/// Weekly availability as the doctor sees it, in their own zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAvailabilityRequest {
    pub timezone: String,
    pub slots: Vec<AvailabilitySlot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotQuery {
    /// `YYYY-MM-DD` in the viewer's zone.
    pub date: String,
    pub timezone: Option<String>,
}

/// A bookable consultation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableTimeSlot {
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    /// UTC date and times in the form appointments are booked with.
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub local_date: String,
    pub local_start_time: String,
    pub local_end_time: String,
    pub timezone: String,
}

/// The slice of an appointment row slot generation needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookedAppointment {
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

// Applications

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorApplication {
    pub id: Uuid,
    pub user_id: String,
    pub specialty: String,
    pub license_number: String,
    pub years_experience: Option<i32>,
    pub credentials_url: Option<String>,
    #[serde(default)]
    pub documents: Vec<ApplicationDocument>,
    pub status: ApplicationStatus,
    #[serde(default)]
    pub review_history: Vec<ReviewEntry>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDocument {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub reviewer_id: String,
    pub decision: ApplicationStatus,
    pub notes: Option<String>,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    pub fn application_status(self) -> ApplicationStatus {
        match self {
            ReviewDecision::Approve => ApplicationStatus::Approved,
            ReviewDecision::Reject => ApplicationStatus::Rejected,
        }
    }

    pub fn verification_status(self) -> VerificationStatus {
        match self {
            ReviewDecision::Approve => VerificationStatus::Verified,
            ReviewDecision::Reject => VerificationStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateApplicationRequest {
    pub specialty: String,
    pub license_number: String,
    pub years_experience: Option<i32>,
    pub credentials_url: Option<String>,
    #[serde(default)]
    pub documents: Vec<ApplicationDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewApplicationRequest {
    pub decision: ReviewDecision,
    pub notes: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Doctor profile already exists")]
    AlreadyExists,

    #[error("Application not found")]
    ApplicationNotFound,

    #[error("A pending application already exists")]
    PendingApplicationExists,

    #[error("Application has already been reviewed")]
    ApplicationAlreadyReviewed,

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound | DoctorError::ApplicationNotFound => AppError::NotFound(err.to_string()),
            DoctorError::AlreadyExists
            | DoctorError::PendingApplicationExists
            | DoctorError::ApplicationAlreadyReviewed => AppError::Conflict(err.to_string()),
            DoctorError::InvalidTimezone(_) => AppError::BadRequest(err.to_string()),
            DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
            DoctorError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
