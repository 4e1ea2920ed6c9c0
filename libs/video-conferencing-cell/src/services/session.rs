use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use appointment_cell::{Appointment, AppointmentService, AppointmentStatus};
use shared_config::AppConfig;
use shared_models::auth::User;

use crate::models::{VideoError, VideoTokenResponse, CLIENT_TOKEN_TTL_SECS};
use crate::services::VonageClient;

/// One provider session per appointment, created on first join.
pub struct VideoSessionService {
    appointments: AppointmentService,
    vonage: Option<VonageClient>,
}

impl VideoSessionService {
    pub fn new(config: &AppConfig) -> Result<Self, VideoError> {
        Ok(Self {
            appointments: AppointmentService::new(config),
            vonage: VonageClient::from_config(config)?,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.vonage.is_some()
    }

    pub fn application_id(&self) -> Option<&str> {
        self.vonage.as_ref().map(VonageClient::application_id)
    }

    pub async fn issue_token(&self, user: &User, appointment_id: Uuid) -> Result<VideoTokenResponse, VideoError> {
        let appointment = self.appointments.get_for_user(user, appointment_id).await?;
        if !appointment.is_participant(&user.id) {
            return Err(VideoError::NotParticipant);
        }
        if appointment.status != AppointmentStatus::Scheduled {
            return Err(VideoError::NotScheduled(appointment.status));
        }

        let Some(vonage) = &self.vonage else {
            warn!("Video not configured, issuing demo token for appointment {}", appointment_id);
            return Ok(VideoTokenResponse {
                session_id: format!("demo_session_{}", appointment_id.simple()),
                token: format!("demo_token_{}", Uuid::new_v4().simple()),
                application_id: "demo".to_string(),
                expires_at: Utc::now() + Duration::seconds(CLIENT_TOKEN_TTL_SECS),
                demo: true,
            });
        };

        let session_id = self.session_for(vonage, user, &appointment).await?;
        let (token, expires_at) = vonage.client_token(&session_id, user, Utc::now())?;

        info!("Video token issued to {} for appointment {}", user.id, appointment_id);
        Ok(VideoTokenResponse {
            session_id,
            token,
            application_id: vonage.application_id().to_string(),
            expires_at,
            demo: false,
        })
    }

    async fn session_for(&self, vonage: &VonageClient, user: &User, appointment: &Appointment) -> Result<String, VideoError> {
        if let Some(session_id) = &appointment.video_session_id {
            return Ok(session_id.clone());
        }

        let created = vonage.create_session().await?;
        if self
            .appointments
            .attach_video_session(appointment.id, &created)
            .await?
            .is_some()
        {
            return Ok(created);
        }

        // The other participant attached a session first
        let current = self.appointments.get_for_user(user, appointment.id).await?;
        current
            .video_session_id
            .ok_or_else(|| VideoError::Provider("Video session could not be attached to the appointment".to_string()))
    }
}
