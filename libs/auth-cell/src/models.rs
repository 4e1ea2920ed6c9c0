use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use doctor_cell::DoctorError;
use patient_cell::PatientError;
use shared_database::DatabaseError;
use shared_models::auth::Role;
use shared_models::error::AppError;

/// Stored account, keyed by the identity provider's user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub auth_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn is_onboarded(&self) -> bool {
        self.role != Role::Unassigned
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Suspended,
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserStatus::Active => write!(f, "active"),
            UserStatus::Suspended => write!(f, "suspended"),
        }
    }
}

impl FromStr for UserStatus {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "suspended" => Ok(UserStatus::Suspended),
            other => Err(AuthError::ValidationError(format!("Unknown user status: {}", other))),
        }
    }
}

/// Role selection plus the profile fields that role needs.
#[derive(Debug, Clone, Deserialize)]
pub struct OnboardingRequest {
    pub role: Role,
    pub name: Option<String>,
    // patient
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    // doctor
    pub specialty: Option<String>,
    pub license_number: Option<String>,
    pub years_experience: Option<i32>,
    pub bio: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub limit: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("User not found")]
    UserNotFound,

    #[error("User has already completed onboarding")]
    AlreadyOnboarded,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Identity provider error: {0}")]
    Identity(String),

    #[error(transparent)]
    Patient(#[from] PatientError),

    #[error(transparent)]
    Doctor(#[from] DoctorError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UserNotFound => AppError::NotFound(err.to_string()),
            AuthError::AlreadyOnboarded => AppError::Conflict(err.to_string()),
            AuthError::ValidationError(msg) => AppError::ValidationError(msg),
            AuthError::Identity(msg) => AppError::ExternalService(msg),
            AuthError::Patient(e) => e.into(),
            AuthError::Doctor(e) => e.into(),
            AuthError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
