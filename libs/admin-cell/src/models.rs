use serde::{Deserialize, Serialize};

use auth_cell::{AuthError, UserStatus};
use doctor_cell::{ApplicationStatus, DoctorError, VerificationStatus};
use shared_database::DatabaseError;
use shared_models::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserStatusRequest {
    pub status: UserStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationListQuery {
    pub status: Option<ApplicationStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateVerificationRequest {
    pub status: VerificationStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DoctorCounts {
    pub total: i64,
    pub pending: i64,
    pub verified: i64,
    pub rejected: i64,
    pub suspended: i64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct AppointmentCounts {
    pub total: i64,
    pub scheduled: i64,
    pub completed: i64,
    pub cancelled: i64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PlatformStats {
    pub users: i64,
    pub suspended_users: i64,
    pub patients: i64,
    pub doctors: DoctorCounts,
    pub appointments: AppointmentCounts,
    pub pending_applications: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Administrators cannot change their own account status")]
    CannotModifySelf,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Doctor(#[from] DoctorError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<AdminError> for AppError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::CannotModifySelf => AppError::BadRequest(err.to_string()),
            AdminError::Auth(e) => e.into(),
            AdminError::Doctor(e) => e.into(),
            AdminError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
