use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use appointment_cell::{AppointmentError, AppointmentStatus};
use shared_models::error::AppError;

/// Lifetime of a participant token.
pub const CLIENT_TOKEN_TTL_SECS: i64 = 2 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct VideoTokenRequest {
    pub appointment_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoTokenResponse {
    pub session_id: String,
    pub token: String,
    pub application_id: String,
    pub expires_at: DateTime<Utc>,
    pub demo: bool,
}

/// Claims for both the application token used against the REST API and the
/// participant token handed to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VonageClaims {
    pub application_id: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_layout_class_list: Option<String>,
    /// Connection data visible to other participants.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatedSession {
    pub session_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    #[error("Video sessions are only available for scheduled appointments (status: {0})")]
    NotScheduled(AppointmentStatus),

    #[error("Only appointment participants can join the video session")]
    NotParticipant,

    #[error("Invalid video signing key: {0}")]
    InvalidKey(String),

    #[error("Failed to sign video token: {0}")]
    Signing(String),

    #[error("Video provider error: {0}")]
    Provider(String),

    #[error(transparent)]
    Appointment(#[from] AppointmentError),
}

impl From<VideoError> for AppError {
    fn from(err: VideoError) -> Self {
        match err {
            VideoError::NotScheduled(_) => AppError::Conflict(err.to_string()),
            VideoError::NotParticipant => AppError::Forbidden(err.to_string()),
            VideoError::InvalidKey(_) | VideoError::Signing(_) => AppError::Internal(err.to_string()),
            VideoError::Provider(msg) => AppError::ExternalService(msg),
            VideoError::Appointment(e) => e.into(),
        }
    }
}
