use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::models::{Appointment, AppointmentError, AppointmentStatus};

/// `scheduled -> completed | cancelled`; both outcomes are terminal.
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition(current_status));
        }
        Ok(())
    }

    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Scheduled => vec![AppointmentStatus::Completed, AppointmentStatus::Cancelled],
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => vec![],
        }
    }

    /// A consultation can be completed once its start time has passed.
    pub fn can_complete(&self, appointment: &Appointment, now: NaiveDateTime) -> Result<(), AppointmentError> {
        self.validate_status_transition(appointment.status, AppointmentStatus::Completed)?;

        let starts_at = appointment
            .starts_at()
            .ok_or_else(|| AppointmentError::InvalidTime(format!("{} {}", appointment.date, appointment.start_time)))?;
        if now < starts_at {
            return Err(AppointmentError::NotStarted);
        }
        Ok(())
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
