use chrono::{Duration, NaiveDateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{eq, DatabaseClient, DatabaseError};
use shared_models::auth::{Role, User};
use shared_utils::rbac::is_admin;
use shared_utils::timezone::format_time;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};

pub(crate) const TABLE: &str = "appointments";

/// Reads and conditional writes of appointment rows.
pub struct AppointmentService {
    db: DatabaseClient,
}

impl AppointmentService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: DatabaseClient::new(config),
        }
    }

    pub(crate) fn is_configured(&self) -> bool {
        self.db.is_configured()
    }

    /// Fetch an appointment the caller takes part in, or any appointment for admins.
    pub async fn get_for_user(&self, user: &User, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        if !self.db.is_configured() {
            let mut appointment = demo_appointment(user);
            appointment.id = appointment_id;
            return Ok(appointment);
        }

        let appointment: Appointment = self
            .db
            .select_one(TABLE, &format!("id={}", eq(appointment_id.to_string())))
            .await?
            .ok_or(AppointmentError::NotFound)?;

        if !appointment.is_participant(&user.id) && !is_admin(user) {
            return Err(AppointmentError::Unauthorized);
        }
        Ok(appointment)
    }

    /// The caller's appointments by role; admins see everyone's.
    pub async fn list_for_user(
        &self,
        user: &User,
        status: Option<AppointmentStatus>,
        limit: u32,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let scope = match user.role() {
            Role::Patient => Some(format!("patient_id={}", eq(&user.id))),
            Role::Doctor => Some(format!("doctor_id={}", eq(&user.id))),
            Role::Admin => None,
            Role::Unassigned => return Err(AppointmentError::Unauthorized),
        };

        if !self.db.is_configured() {
            let appointment = demo_appointment(user);
            return Ok(match status {
                Some(status) if status != appointment.status => Vec::new(),
                _ => vec![appointment],
            });
        }

        let mut query = format!("order=date.desc,start_time.desc&limit={}", limit.clamp(1, 200));
        if let Some(scope) = scope {
            query.push('&');
            query.push_str(&scope);
        }
        if let Some(status) = status {
            query.push_str(&format!("&status=eq.{}", status));
        }

        Ok(self.db.select(TABLE, &query).await?)
    }

    pub(crate) async fn create(&self, row: Value) -> Result<Appointment, AppointmentError> {
        if !self.db.is_configured() {
            return Ok(serde_json::from_value(row).map_err(DatabaseError::from)?);
        }
        Ok(self.db.insert(TABLE, row).await?)
    }

    /// Whether `user_id` (as `column`) already has a scheduled appointment
    /// overlapping `[start, end)`.
    pub(crate) async fn has_overlap(
        &self,
        column: &str,
        user_id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<bool, AppointmentError> {
        if !self.db.is_configured() {
            return Ok(false);
        }

        let day = start.date();
        let dates = [day - Duration::days(1), day, day + Duration::days(1)]
            .iter()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .collect::<Vec<_>>()
            .join(",");
        let query = format!("{}={}&status=eq.scheduled&date=in.({})", column, eq(user_id), dates);

        let existing: Vec<Appointment> = self.db.select(TABLE, &query).await?;
        Ok(existing.iter().any(|appointment| {
            match (appointment.starts_at(), appointment.ends_at()) {
                (Some(other_start), Some(other_end)) => start < other_end && end > other_start,
                _ => false,
            }
        }))
    }

    /// Move a scheduled appointment to `to`, applying `changes` in the same
    /// write. Fails if the row is no longer scheduled.
    pub(crate) async fn transition(
        &self,
        appointment: &Appointment,
        to: AppointmentStatus,
        mut changes: Map<String, Value>,
    ) -> Result<Appointment, AppointmentError> {
        changes.insert("status".to_string(), json!(to));
        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        if !self.db.is_configured() {
            let mut updated = appointment.clone();
            updated.status = to;
            return Ok(updated);
        }

        let filter = format!("id={}&status=eq.scheduled", eq(appointment.id.to_string()));
        let mut updated: Vec<Appointment> = self.db.update(TABLE, &filter, Value::Object(changes)).await?;

        if updated.is_empty() {
            return Err(AppointmentError::ConcurrentModification);
        }
        info!("Appointment {} is now {}", appointment.id, to);
        Ok(updated.remove(0))
    }

    /// Doctor-of-record notes; cancelled appointments are frozen.
    pub async fn update_notes(&self, user: &User, appointment_id: Uuid, notes: &str) -> Result<Appointment, AppointmentError> {
        if notes.chars().count() > 5000 {
            return Err(AppointmentError::ValidationError("notes must be at most 5000 characters".to_string()));
        }

        let mut appointment = self.get_for_user(user, appointment_id).await?;
        if appointment.doctor_id != user.id {
            return Err(AppointmentError::Unauthorized);
        }
        if appointment.status == AppointmentStatus::Cancelled {
            return Err(AppointmentError::InvalidStatusTransition(appointment.status));
        }

        if !self.db.is_configured() {
            appointment.notes = Some(notes.to_string());
            return Ok(appointment);
        }

        let filter = format!("id={}&status=neq.cancelled", eq(appointment_id.to_string()));
        let mut updated: Vec<Appointment> = self
            .db
            .update(
                TABLE,
                &filter,
                json!({ "notes": notes, "updated_at": Utc::now().to_rfc3339() }),
            )
            .await?;

        if updated.is_empty() {
            return Err(AppointmentError::ConcurrentModification);
        }
        debug!("Notes updated on appointment {}", appointment_id);
        Ok(updated.remove(0))
    }

    /// Attach a video session unless one is already attached. `None` means
    /// another request attached one first.
    pub async fn attach_video_session(
        &self,
        appointment_id: Uuid,
        session_id: &str,
    ) -> Result<Option<Appointment>, AppointmentError> {
        if !self.db.is_configured() {
            return Ok(None);
        }

        let filter = format!("id={}&video_session_id=is.null", eq(appointment_id.to_string()));
        let mut updated: Vec<Appointment> = self
            .db
            .update(
                TABLE,
                &filter,
                json!({ "video_session_id": session_id, "updated_at": Utc::now().to_rfc3339() }),
            )
            .await?;

        Ok(if updated.is_empty() { None } else { Some(updated.remove(0)) })
    }
}

/// Tomorrow 09:00 UTC with the caller on the side their role suggests.
pub(crate) fn demo_appointment(user: &User) -> Appointment {
    let now = Utc::now();
    let start = (now + Duration::days(1)).date_naive().and_hms_opt(9, 0, 0).unwrap_or(now.naive_utc());
    let (patient_id, doctor_id) = match user.role() {
        Role::Doctor => ("demo_patient_1".to_string(), user.id.clone()),
        _ => (user.id.clone(), "demo_doctor_1".to_string()),
    };

    Appointment {
        id: Uuid::new_v4(),
        patient_id,
        doctor_id,
        date: start.format("%Y-%m-%d").to_string(),
        start_time: format_time(start.time()),
        end_time: format_time((start + Duration::minutes(30)).time()),
        status: AppointmentStatus::Scheduled,
        notes: None,
        patient_description: Some("Demo consultation".to_string()),
        video_session_id: None,
        credits_charged: 2,
        created_at: now,
        updated_at: now,
    }
}
