use serde_json::{json, Value};
use tracing::{info, warn};

use doctor_cell::{CreateDoctorProfile, DoctorService};
use patient_cell::{CreditService, PatientService, UpdatePatientRequest};
use shared_config::AppConfig;
use shared_models::auth::{Role, User};

use crate::models::{AuthError, OnboardingRequest, UserRecord};
use crate::services::{IdentityClient, UserService};

/// Role selection for a freshly signed-up user.
pub struct OnboardingService<'a> {
    config: &'a AppConfig,
    users: UserService,
    identity: Option<IdentityClient>,
}

impl<'a> OnboardingService<'a> {
    pub fn new(config: &'a AppConfig) -> Self {
        Self {
            config,
            users: UserService::new(config),
            identity: IdentityClient::from_config(config),
        }
    }

    /// Assign `patient` or `doctor` and create the matching profile.
    ///
    /// Only unassigned users may onboard. The identity provider is updated
    /// before anything is written locally, and profile creation reuses an
    /// existing profile, so a failed attempt can simply be retried.
    pub async fn onboard(&self, user: &User, request: OnboardingRequest) -> Result<(UserRecord, Value), AuthError> {
        if !matches!(request.role, Role::Patient | Role::Doctor) {
            return Err(AuthError::ValidationError("role must be patient or doctor".to_string()));
        }
        if request.role == Role::Doctor && request.specialty.as_deref().is_none_or(|s| s.trim().is_empty()) {
            return Err(AuthError::ValidationError("specialty is required for doctors".to_string()));
        }

        let record = self.users.get_or_create(user).await?;
        if record.is_onboarded() {
            return Err(AuthError::AlreadyOnboarded);
        }

        match &self.identity {
            Some(identity) => identity.update_role(&user.id, request.role).await?,
            None => warn!("Identity provider not configured, role for {} kept locally only", user.id),
        }

        let profile = match request.role {
            Role::Patient => self.create_patient(user, &request).await?,
            _ => self.create_doctor(user, request.clone()).await?,
        };

        let record = self.users.set_role(&user.id, request.role).await?;
        info!("User {} onboarded as {}", user.id, request.role);
        Ok((record, profile))
    }

    async fn create_patient(&self, user: &User, request: &OnboardingRequest) -> Result<Value, AuthError> {
        let patients = PatientService::new(self.config);
        let credits = CreditService::new(self.config);

        let mut patient = match patients.find_by_user(&user.id).await? {
            Some(existing) if self.config.is_database_configured() => existing,
            _ => patients.create_for_user(&user.id, &credits).await?,
        };

        if request.phone.is_some() || request.date_of_birth.is_some() {
            let update = UpdatePatientRequest {
                phone: request.phone.clone(),
                date_of_birth: request.date_of_birth.clone(),
            };
            patient = patients.update_profile(&user.id, update).await?;
        }

        Ok(json!(patient))
    }

    async fn create_doctor(&self, user: &User, request: OnboardingRequest) -> Result<Value, AuthError> {
        let doctors = DoctorService::new(self.config);

        if self.config.is_database_configured() {
            if let Some(existing) = doctors.find_by_user(&user.id).await? {
                return Ok(json!(existing));
            }
        }

        let profile = CreateDoctorProfile {
            name: request.name.unwrap_or_else(|| user.display_name()),
            email: user.email.clone(),
            specialty: request.specialty.unwrap_or_default(),
            license_number: request.license_number,
            years_experience: request.years_experience,
            bio: request.bio,
            timezone: request.timezone,
        };

        Ok(json!(doctors.create_for_user(&user.id, profile).await?))
    }
}
