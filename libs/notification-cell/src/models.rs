use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AppointmentBooked,
    AppointmentCancelled,
    AppointmentCompleted,
    CreditsPurchased,
    ApplicationReviewed,
    VerificationUpdated,
    AccountStatus,
    General,
}

/// What a cell hands to [`crate::NotificationService::notify`].
#[derive(Debug, Clone)]
pub struct NotificationRequest {
    pub user_id: String,
    /// Also sent as an email when present and email is configured.
    pub email: Option<String>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

impl NotificationRequest {
    pub fn new(user_id: &str, kind: NotificationKind, title: &str, message: impl Into<String>) -> Self {
        Self {
            user_id: user_id.to_string(),
            email: None,
            kind,
            title: title.to_string(),
            message: message.into(),
            link: None,
        }
    }

    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    pub fn with_link(mut self, link: &str) -> Self {
        self.link = Some(link.to_string());
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationListQuery {
    pub unread_only: Option<bool>,
    pub limit: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification not found")]
    NotFound,

    #[error("Email delivery failed: {0}")]
    Email(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotFound => AppError::NotFound(err.to_string()),
            NotificationError::Email(msg) => AppError::ExternalService(msg),
            NotificationError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
