use chrono::{Duration, NaiveDateTime, Utc};
use serde_json::{json, Map};
use tracing::{debug, error, info};
use uuid::Uuid;

use doctor_cell::services::availability::covers_consultation;
use doctor_cell::{DoctorService, CONSULTATION_MINUTES};
use notification_cell::{NotificationKind, NotificationRequest, NotificationService};
use patient_cell::{CreditAdjustment, CreditService, TransactionKind};
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_utils::timezone::{format_time, is_valid_timezone, local_to_utc, parse_time};
use shared_utils::validation::parse_date;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest};
use crate::services::{AppointmentLifecycleService, AppointmentService};

/// Booking, cancellation and completion, with the credit movements and
/// notifications each one implies.
pub struct AppointmentBookingService {
    appointments: AppointmentService,
    doctors: DoctorService,
    credits: CreditService,
    notifications: NotificationService,
    lifecycle: AppointmentLifecycleService,
    credits_per_appointment: i64,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            appointments: AppointmentService::new(config),
            doctors: DoctorService::new(config),
            credits: CreditService::new(config),
            notifications: NotificationService::new(config),
            lifecycle: AppointmentLifecycleService::new(),
            credits_per_appointment: config.credits_per_appointment,
        }
    }

    pub async fn book(&self, patient: &User, request: BookAppointmentRequest) -> Result<Appointment, AppointmentError> {
        debug!("Booking request from {} for doctor {}", patient.id, request.doctor_id);

        let start = resolve_start(&request)?;
        if start <= Utc::now().naive_utc() {
            return Err(AppointmentError::InvalidTime("Appointment time is in the past".to_string()));
        }
        let end = start + Duration::minutes(CONSULTATION_MINUTES);

        if let Some(description) = &request.patient_description {
            if description.chars().count() > 2000 {
                return Err(AppointmentError::ValidationError(
                    "patient_description must be at most 2000 characters".to_string(),
                ));
            }
        }

        let doctor = self.doctors.get_by_user(&request.doctor_id).await?;
        if !doctor.is_verified() {
            return Err(AppointmentError::DoctorNotVerified);
        }
        if !covers_consultation(&doctor.availability, start) {
            return Err(AppointmentError::SlotNotAvailable);
        }
        if self.appointments.has_overlap("doctor_id", &doctor.user_id, start, end).await?
            || self.appointments.has_overlap("patient_id", &patient.id, start, end).await?
        {
            return Err(AppointmentError::ConflictDetected);
        }

        let appointment_id = Uuid::new_v4();
        let date = start.format("%Y-%m-%d").to_string();
        let start_time = format_time(start.time());
        let cost = self.credits_per_appointment;

        if cost > 0 {
            self.credits
                .adjust_credits(CreditAdjustment {
                    user_id: patient.id.clone(),
                    delta: -cost,
                    kind: TransactionKind::AppointmentDebit,
                    description: format!("Consultation with {} on {} {} UTC", doctor.name, date, start_time),
                    reference_id: Some(appointment_id.to_string()),
                    amount_cents: None,
                })
                .await?;
        }

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "id": appointment_id,
            "patient_id": patient.id,
            "doctor_id": doctor.user_id,
            "date": date,
            "start_time": start_time,
            "end_time": format_time(end.time()),
            "status": AppointmentStatus::Scheduled,
            "notes": null,
            "patient_description": request.patient_description,
            "video_session_id": null,
            "credits_charged": cost,
            "created_at": now,
            "updated_at": now,
        });

        let appointment = match self.appointments.create(row).await {
            Ok(appointment) => appointment,
            Err(e) => {
                error!("Failed to store appointment {}: {}", appointment_id, e);
                if cost > 0 {
                    self.compensate(CreditAdjustment {
                        user_id: patient.id.clone(),
                        delta: cost,
                        kind: TransactionKind::AppointmentRefund,
                        description: "Refund for failed booking".to_string(),
                        reference_id: Some(appointment_id.to_string()),
                        amount_cents: None,
                    })
                    .await;
                }
                return Err(e);
            }
        };

        info!(
            "Appointment {} booked: patient {} with doctor {} at {} {}",
            appointment.id, patient.id, doctor.user_id, appointment.date, appointment.start_time
        );

        let when = format!("{} {} UTC", appointment.date, appointment.start_time);
        let link = format!("/appointments/{}", appointment.id);
        self.notifications
            .notify(
                NotificationRequest::new(
                    &patient.id,
                    NotificationKind::AppointmentBooked,
                    "Appointment booked",
                    format!("Your consultation with {} is booked for {}.", doctor.name, when),
                )
                .with_email(patient.email.clone())
                .with_link(&link),
            )
            .await;
        self.notifications
            .notify(
                NotificationRequest::new(
                    &doctor.user_id,
                    NotificationKind::AppointmentBooked,
                    "New appointment",
                    format!("{} booked a consultation for {}.", patient.display_name(), when),
                )
                .with_email(doctor.email.clone())
                .with_link(&link),
            )
            .await;

        Ok(appointment)
    }

    /// Cancel a scheduled appointment and refund the patient in full.
    ///
    /// The refund lands before the status changes, so a failed refund leaves
    /// the appointment scheduled and the request can be retried. If the
    /// status change then fails the refund is taken back.
    pub async fn cancel(&self, user: &User, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.appointments.get_for_user(user, appointment_id).await?;
        if !appointment.is_participant(&user.id) {
            return Err(AppointmentError::Unauthorized);
        }
        self.lifecycle
            .validate_status_transition(appointment.status, AppointmentStatus::Cancelled)?;

        let credits = appointment.credits_charged;
        if credits > 0 {
            self.credits
                .adjust_credits(CreditAdjustment {
                    user_id: appointment.patient_id.clone(),
                    delta: credits,
                    kind: TransactionKind::AppointmentRefund,
                    description: format!("Refund for cancelled consultation on {}", appointment.date),
                    reference_id: Some(appointment.id.to_string()),
                    amount_cents: None,
                })
                .await?;
        }

        let cancelled = match self
            .appointments
            .transition(&appointment, AppointmentStatus::Cancelled, Map::new())
            .await
        {
            Ok(cancelled) => cancelled,
            Err(e) => {
                error!("Failed to cancel appointment {}: {}", appointment.id, e);
                if credits > 0 {
                    self.compensate(CreditAdjustment {
                        user_id: appointment.patient_id.clone(),
                        delta: -credits,
                        kind: TransactionKind::Adjustment,
                        description: format!("Refund reversed, consultation on {} was not cancelled", appointment.date),
                        reference_id: Some(appointment.id.to_string()),
                        amount_cents: None,
                    })
                    .await;
                }
                return Err(e);
            }
        };

        self.notifications
            .notify(
                NotificationRequest::new(
                    appointment.counterparty(&user.id),
                    NotificationKind::AppointmentCancelled,
                    "Appointment cancelled",
                    format!(
                        "The consultation on {} at {} UTC was cancelled.",
                        appointment.date, appointment.start_time
                    ),
                )
                .with_link(&format!("/appointments/{}", appointment.id)),
            )
            .await;

        Ok(cancelled)
    }

    /// Doctor of record closes the consultation; the charged credits go to
    /// the doctor's earnings ledger.
    pub async fn complete(&self, doctor: &User, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self.appointments.get_for_user(doctor, appointment_id).await?;
        if appointment.doctor_id != doctor.id {
            return Err(AppointmentError::Unauthorized);
        }

        if self.appointments.is_configured() {
            self.lifecycle.can_complete(&appointment, Utc::now().naive_utc())?;
        } else {
            self.lifecycle
                .validate_status_transition(appointment.status, AppointmentStatus::Completed)?;
        }

        let completed = self
            .appointments
            .transition(&appointment, AppointmentStatus::Completed, Map::new())
            .await?;

        if appointment.credits_charged > 0 {
            self.credits
                .record_transaction(
                    &appointment.doctor_id,
                    TransactionKind::ConsultationEarning,
                    appointment.credits_charged,
                    &format!("Consultation on {} completed", appointment.date),
                    Some(&appointment.id.to_string()),
                    None,
                )
                .await?;
        }

        self.notifications
            .notify(
                NotificationRequest::new(
                    &appointment.patient_id,
                    NotificationKind::AppointmentCompleted,
                    "Consultation completed",
                    format!("Your consultation on {} has been marked complete.", appointment.date),
                )
                .with_link(&format!("/appointments/{}", appointment.id)),
            )
            .await;

        Ok(completed)
    }

    /// Best-effort credit movement that undoes an earlier one.
    async fn compensate(&self, adjustment: CreditAdjustment) {
        let (user_id, delta) = (adjustment.user_id.clone(), adjustment.delta);
        if let Err(e) = self.credits.adjust_credits(adjustment).await {
            error!("Failed to move {} credits for {}: {}", delta, user_id, e);
        }
    }
}

/// Requested start as a UTC date-time.
fn resolve_start(request: &BookAppointmentRequest) -> Result<NaiveDateTime, AppointmentError> {
    let date = parse_date("date", &request.date).map_err(|e| AppointmentError::ValidationError(e.message().to_string()))?;
    let time = parse_time(&request.start_time)
        .ok_or_else(|| AppointmentError::ValidationError("start_time must be HH:MM".to_string()))?;

    match request.timezone.as_deref() {
        None => Ok(date.and_time(time)),
        Some(timezone) if !is_valid_timezone(timezone) => {
            Err(AppointmentError::ValidationError(format!("Invalid timezone: {}", timezone)))
        }
        Some(timezone) => local_to_utc(date, time, timezone)
            .ok_or_else(|| AppointmentError::InvalidTime(format!("{} {} in {}", request.date, request.start_time, timezone))),
    }
}
