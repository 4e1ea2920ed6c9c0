use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{eq, DatabaseClient, DatabaseError};
use shared_models::auth::{Role, User};

use crate::models::{AuthError, UserRecord, UserStatus};

const TABLE: &str = "users";

pub struct UserService {
    db: DatabaseClient,
}

impl UserService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: DatabaseClient::new(config),
        }
    }

    pub async fn find(&self, auth_id: &str) -> Result<Option<UserRecord>, AuthError> {
        if !self.db.is_configured() {
            return Ok(None);
        }

        Ok(self.db.select_one(TABLE, &format!("auth_id={}", eq(auth_id))).await?)
    }

    pub async fn get(&self, auth_id: &str) -> Result<UserRecord, AuthError> {
        if !self.db.is_configured() {
            return Ok(demo_record(auth_id, Role::Unassigned));
        }
        self.find(auth_id).await?.ok_or(AuthError::UserNotFound)
    }

    /// The caller's stored record, created on first sight from the token claims.
    pub async fn get_or_create(&self, user: &User) -> Result<UserRecord, AuthError> {
        if !self.db.is_configured() {
            let mut record = demo_record(&user.id, user.role());
            record.email = user.email.clone();
            record.name = user.name.clone();
            return Ok(record);
        }

        if let Some(record) = self.find(&user.id).await? {
            return Ok(record);
        }

        debug!("First request from {}, creating user record", user.id);
        let now = Utc::now().to_rfc3339();
        let record: UserRecord = self
            .db
            .insert(
                TABLE,
                json!({
                    "auth_id": user.id,
                    "email": user.email,
                    "name": user.name,
                    "role": user.role(),
                    "status": UserStatus::Active,
                    "created_at": now,
                    "updated_at": now,
                }),
            )
            .await?;

        info!("User record {} created for {}", record.id, user.id);
        Ok(record)
    }

    pub async fn set_role(&self, auth_id: &str, role: Role) -> Result<UserRecord, AuthError> {
        self.update(auth_id, json!({ "role": role })).await
    }

    pub async fn set_status(&self, auth_id: &str, status: UserStatus) -> Result<UserRecord, AuthError> {
        let record = self.update(auth_id, json!({ "status": status })).await?;
        info!("User {} status set to {}", auth_id, status);
        Ok(record)
    }

    pub async fn list(
        &self,
        role: Option<Role>,
        status: Option<UserStatus>,
        limit: u32,
    ) -> Result<Vec<UserRecord>, AuthError> {
        if !self.db.is_configured() {
            let records = vec![
                demo_record("demo_patient_1", Role::Patient),
                demo_record("demo_doctor_1", Role::Doctor),
                demo_record("demo_admin_1", Role::Admin),
            ];
            return Ok(records
                .into_iter()
                .filter(|r| role.is_none_or(|role| r.role == role))
                .filter(|r| status.is_none_or(|status| r.status == status))
                .collect());
        }

        let mut query = format!("order=created_at.desc&limit={}", limit.clamp(1, 500));
        if let Some(role) = role {
            query.push_str(&format!("&role=eq.{}", role));
        }
        if let Some(status) = status {
            query.push_str(&format!("&status=eq.{}", status));
        }
        Ok(self.db.select(TABLE, &query).await?)
    }

    async fn update(&self, auth_id: &str, mut changes: serde_json::Value) -> Result<UserRecord, AuthError> {
        if !self.db.is_configured() {
            let mut record = serde_json::to_value(demo_record(auth_id, Role::Unassigned))
                .map_err(DatabaseError::from)?;
            if let (Some(record), Some(changes)) = (record.as_object_mut(), changes.as_object()) {
                record.extend(changes.clone());
            }
            return Ok(serde_json::from_value(record).map_err(DatabaseError::from)?);
        }

        changes["updated_at"] = json!(Utc::now().to_rfc3339());
        let mut updated: Vec<UserRecord> = self
            .db
            .update(TABLE, &format!("auth_id={}", eq(auth_id)), changes)
            .await?;

        if updated.is_empty() {
            return Err(AuthError::UserNotFound);
        }
        Ok(updated.remove(0))
    }
}

fn demo_record(auth_id: &str, role: Role) -> UserRecord {
    let now = Utc::now();
    UserRecord {
        id: Uuid::new_v4(),
        auth_id: auth_id.to_string(),
        email: None,
        name: None,
        role,
        status: UserStatus::Active,
        created_at: now,
        updated_at: now,
    }
}
