use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use doctor_cell::DoctorError;
use patient_cell::PatientError;
use shared_database::DatabaseError;
use shared_models::error::AppError;
use shared_utils::timezone::parse_time;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

/// A booked consultation. `date` and times are UTC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: String,
    pub doctor_id: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub patient_description: Option<String>,
    pub video_session_id: Option<String>,
    pub credits_charged: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn starts_at(&self) -> Option<NaiveDateTime> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok()?;
        Some(date.and_time(parse_time(&self.start_time)?))
    }

    /// End instant; an end time at or before the start falls on the next day.
    pub fn ends_at(&self) -> Option<NaiveDateTime> {
        let start = self.starts_at()?;
        let end = parse_time(&self.end_time)?;
        let end_date = if end <= start.time() { start.date() + Duration::days(1) } else { start.date() };
        Some(end_date.and_time(end))
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.patient_id == user_id || self.doctor_id == user_id
    }

    /// The other side of the consultation from `user_id`.
    pub fn counterparty(&self, user_id: &str) -> &str {
        if self.patient_id == user_id {
            &self.doctor_id
        } else {
            &self.patient_id
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: String,
    /// `YYYY-MM-DD`; in `timezone` when given, otherwise UTC.
    pub date: String,
    /// `HH:MM`; in `timezone` when given, otherwise UTC.
    pub start_time: String,
    pub timezone: Option<String>,
    pub patient_description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<AppointmentStatus>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateNotesRequest {
    pub notes: String,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Doctor is not verified for consultations")]
    DoctorNotVerified,

    #[error("Requested time is outside the doctor's availability")]
    SlotNotAvailable,

    #[error("Appointment conflicts with existing booking")]
    ConflictDetected,

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Appointment cannot be completed before it starts")]
    NotStarted,

    #[error("Appointment was modified concurrently, please retry")]
    ConcurrentModification,

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Patient(#[from] PatientError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<DoctorError> for AppointmentError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound => AppointmentError::DoctorNotFound,
            DoctorError::Database(e) => AppointmentError::Database(e),
            other => AppointmentError::ValidationError(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound | AppointmentError::DoctorNotFound => AppError::NotFound(err.to_string()),
            AppointmentError::DoctorNotVerified
            | AppointmentError::SlotNotAvailable
            | AppointmentError::InvalidTime(_)
            | AppointmentError::NotStarted => AppError::BadRequest(err.to_string()),
            AppointmentError::ConflictDetected
            | AppointmentError::InvalidStatusTransition(_)
            | AppointmentError::ConcurrentModification => AppError::Conflict(err.to_string()),
            AppointmentError::Unauthorized => AppError::Forbidden(err.to_string()),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::Patient(e) => e.into(),
            AppointmentError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
