use futures::try_join;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::DatabaseClient;

use crate::models::{AdminError, AppointmentCounts, DoctorCounts, PlatformStats};

pub struct StatsService {
    db: DatabaseClient,
}

impl StatsService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: DatabaseClient::new(config),
        }
    }

    pub async fn platform_stats(&self) -> Result<PlatformStats, AdminError> {
        if !self.db.is_configured() {
            return Ok(demo_stats());
        }

        debug!("Collecting platform stats");
        let db = &self.db;

        let (users, suspended_users, patients, pending_applications) = try_join!(
            db.count("users", ""),
            db.count("users", "status=eq.suspended"),
            db.count("patients", ""),
            db.count("doctor_applications", "status=eq.pending"),
        )?;

        let (pending, verified, rejected, suspended) = try_join!(
            db.count("doctors", "verification_status=eq.pending"),
            db.count("doctors", "verification_status=eq.verified"),
            db.count("doctors", "verification_status=eq.rejected"),
            db.count("doctors", "verification_status=eq.suspended"),
        )?;

        let (scheduled, completed, cancelled) = try_join!(
            db.count("appointments", "status=eq.scheduled"),
            db.count("appointments", "status=eq.completed"),
            db.count("appointments", "status=eq.cancelled"),
        )?;

        Ok(PlatformStats {
            users,
            suspended_users,
            patients,
            doctors: DoctorCounts {
                total: pending + verified + rejected + suspended,
                pending,
                verified,
                rejected,
                suspended,
            },
            appointments: AppointmentCounts {
                total: scheduled + completed + cancelled,
                scheduled,
                completed,
                cancelled,
            },
            pending_applications,
        })
    }
}

fn demo_stats() -> PlatformStats {
    PlatformStats {
        users: 3,
        suspended_users: 0,
        patients: 1,
        doctors: DoctorCounts {
            total: 2,
            verified: 2,
            ..DoctorCounts::default()
        },
        appointments: AppointmentCounts {
            total: 1,
            scheduled: 1,
            ..AppointmentCounts::default()
        },
        pending_applications: 0,
    }
}
