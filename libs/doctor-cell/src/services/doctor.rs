use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{eq, DatabaseClient, DatabaseError};
use shared_utils::timezone::{is_valid_timezone, AvailabilitySlot};
use shared_utils::validation::{require_max_length, require_non_empty};

use crate::models::{CreateDoctorProfile, Doctor, DoctorError, UpdateDoctorRequest, VerificationStatus};

pub(crate) const TABLE: &str = "doctors";

pub struct DoctorService {
    db: DatabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: DatabaseClient::new(config),
        }
    }

    /// Verified doctors, optionally narrowed to one specialty.
    pub async fn list_verified(&self, specialty: Option<&str>, limit: u32) -> Result<Vec<Doctor>, DoctorError> {
        debug!("Listing verified doctors, specialty filter: {:?}", specialty);

        if !self.db.is_configured() {
            let doctors = demo_doctors();
            return Ok(match specialty {
                Some(s) => doctors.into_iter().filter(|d| d.specialty.eq_ignore_ascii_case(s)).collect(),
                None => doctors,
            });
        }

        let mut query = format!("verification_status=eq.verified&order=name.asc&limit={}", limit.clamp(1, 200));
        if let Some(specialty) = specialty.filter(|s| !s.trim().is_empty()) {
            // ilike without wildcards is a case-insensitive equality
            query.push_str(&format!("&specialty=ilike.{}", urlencoding::encode(specialty)));
        }

        Ok(self.db.select(TABLE, &query).await?)
    }

    pub async fn list_by_status(&self, status: VerificationStatus) -> Result<Vec<Doctor>, DoctorError> {
        if !self.db.is_configured() {
            return Ok(demo_doctors()
                .into_iter()
                .map(|mut d| {
                    d.verification_status = status;
                    d
                })
                .collect());
        }

        let query = format!("verification_status=eq.{}&order=created_at.asc", status);
        Ok(self.db.select(TABLE, &query).await?)
    }

    pub async fn find_by_user(&self, user_id: &str) -> Result<Option<Doctor>, DoctorError> {
        if !self.db.is_configured() {
            return Ok(Some(demo_doctor(user_id)));
        }

        Ok(self.db.select_one(TABLE, &format!("user_id={}", eq(user_id))).await?)
    }

    pub async fn get_by_user(&self, user_id: &str) -> Result<Doctor, DoctorError> {
        self.find_by_user(user_id).await?.ok_or(DoctorError::NotFound)
    }

    /// Public lookup; unverified doctors are invisible.
    pub async fn get_public(&self, user_id: &str) -> Result<Doctor, DoctorError> {
        let doctor = self.get_by_user(user_id).await?;
        if !doctor.is_verified() {
            return Err(DoctorError::NotFound);
        }
        Ok(doctor)
    }

    /// New doctors start `pending` until an admin verifies them.
    pub async fn create_for_user(&self, user_id: &str, profile: CreateDoctorProfile) -> Result<Doctor, DoctorError> {
        debug!("Creating doctor profile for {}", user_id);

        require_non_empty("specialty", &profile.specialty).map_err(validation)?;
        require_max_length("specialty", &profile.specialty, 100).map_err(validation)?;
        if let Some(bio) = &profile.bio {
            require_max_length("bio", bio, 2000).map_err(validation)?;
        }
        let timezone = profile.timezone.unwrap_or_else(|| "UTC".to_string());
        if !is_valid_timezone(&timezone) {
            return Err(DoctorError::InvalidTimezone(timezone));
        }

        if !self.db.is_configured() {
            let mut doctor = demo_doctor(user_id);
            doctor.name = profile.name;
            doctor.email = profile.email;
            doctor.specialty = profile.specialty;
            doctor.timezone = timezone;
            doctor.verification_status = VerificationStatus::Pending;
            return Ok(doctor);
        }

        if self.find_by_user(user_id).await?.is_some() {
            return Err(DoctorError::AlreadyExists);
        }

        let now = Utc::now().to_rfc3339();
        let doctor: Doctor = self
            .db
            .insert(
                TABLE,
                json!({
                    "user_id": user_id,
                    "name": profile.name,
                    "email": profile.email,
                    "specialty": profile.specialty,
                    "license_number": profile.license_number,
                    "years_experience": profile.years_experience,
                    "bio": profile.bio,
                    "timezone": timezone,
                    "verification_status": VerificationStatus::Pending,
                    "availability": [],
                    "created_at": now,
                    "updated_at": now,
                }),
            )
            .await?;

        info!("Doctor profile {} created for {}", doctor.id, user_id);
        Ok(doctor)
    }

    pub async fn update_profile(&self, user_id: &str, request: UpdateDoctorRequest) -> Result<Doctor, DoctorError> {
        let mut changes = Map::new();

        if let Some(name) = request.name {
            require_non_empty("name", &name).map_err(validation)?;
            changes.insert("name".to_string(), json!(name));
        }
        if let Some(specialty) = request.specialty {
            require_non_empty("specialty", &specialty).map_err(validation)?;
            require_max_length("specialty", &specialty, 100).map_err(validation)?;
            changes.insert("specialty".to_string(), json!(specialty));
        }
        if let Some(bio) = request.bio {
            require_max_length("bio", &bio, 2000).map_err(validation)?;
            changes.insert("bio".to_string(), json!(bio));
        }
        if let Some(years) = request.years_experience {
            if !(0..=80).contains(&years) {
                return Err(DoctorError::ValidationError("years_experience must be between 0 and 80".to_string()));
            }
            changes.insert("years_experience".to_string(), json!(years));
        }
        if let Some(timezone) = request.timezone {
            if !is_valid_timezone(&timezone) {
                return Err(DoctorError::InvalidTimezone(timezone));
            }
            changes.insert("timezone".to_string(), json!(timezone));
        }

        if changes.is_empty() {
            return Err(DoctorError::ValidationError("No fields to update".to_string()));
        }

        self.apply_changes(user_id, changes).await
    }

    /// Store already-converted UTC availability together with the zone it was entered in.
    pub async fn store_availability(
        &self,
        user_id: &str,
        timezone: &str,
        availability: Vec<AvailabilitySlot>,
    ) -> Result<Doctor, DoctorError> {
        let mut changes = Map::new();
        changes.insert("timezone".to_string(), json!(timezone));
        changes.insert("availability".to_string(), json!(availability));
        self.apply_changes(user_id, changes).await
    }

    pub async fn set_verification_status(&self, user_id: &str, status: VerificationStatus) -> Result<Doctor, DoctorError> {
        let mut changes = Map::new();
        changes.insert("verification_status".to_string(), json!(status));
        let doctor = self.apply_changes(user_id, changes).await?;
        info!("Doctor {} verification set to {}", user_id, status);
        Ok(doctor)
    }

    async fn apply_changes(&self, user_id: &str, mut changes: Map<String, Value>) -> Result<Doctor, DoctorError> {
        if !self.db.is_configured() {
            let mut doctor = serde_json::to_value(demo_doctor(user_id)).map_err(DatabaseError::from)?;
            if let Value::Object(fields) = &mut doctor {
                fields.extend(changes);
            }
            return Ok(serde_json::from_value(doctor).map_err(DatabaseError::from)?);
        }

        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
        let mut updated: Vec<Doctor> = self
            .db
            .update(TABLE, &format!("user_id={}", eq(user_id)), Value::Object(changes))
            .await?;

        if updated.is_empty() {
            return Err(DoctorError::NotFound);
        }
        Ok(updated.remove(0))
    }
}

fn validation(err: shared_models::error::AppError) -> DoctorError {
    DoctorError::ValidationError(err.message().to_string())
}

pub(crate) fn demo_doctor(user_id: &str) -> Doctor {
    let now = Utc::now();
    Doctor {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        name: "Dr. Demo".to_string(),
        email: Some("demo.doctor@telehealth.local".to_string()),
        specialty: "General Practice".to_string(),
        license_number: Some("DEMO-0001".to_string()),
        years_experience: Some(12),
        bio: Some("Demo profile shown while no database is configured.".to_string()),
        timezone: "UTC".to_string(),
        verification_status: VerificationStatus::Verified,
        availability: ["monday", "tuesday", "wednesday", "thursday", "friday"]
            .iter()
            .map(|day| AvailabilitySlot::new(day, "09:00", "17:00"))
            .collect(),
        created_at: now,
        updated_at: now,
    }
}

fn demo_doctors() -> Vec<Doctor> {
    let mut cardiologist = demo_doctor("demo_doctor_2");
    cardiologist.name = "Dr. Demo Heart".to_string();
    cardiologist.specialty = "Cardiology".to_string();
    vec![demo_doctor("demo_doctor_1"), cardiologist]
}
