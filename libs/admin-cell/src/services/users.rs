use tracing::{info, warn};

use auth_cell::{IdentityClient, UserListQuery, UserRecord, UserService, UserStatus};
use notification_cell::{NotificationKind, NotificationRequest, NotificationService};
use shared_config::AppConfig;
use shared_models::auth::User;

use crate::models::{AdminError, UpdateUserStatusRequest};

/// Account administration; status changes are mirrored to the identity
/// provider so suspended users cannot sign in.
pub struct AdminUserService {
    users: UserService,
    identity: Option<IdentityClient>,
    notifications: NotificationService,
}

impl AdminUserService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            users: UserService::new(config),
            identity: IdentityClient::from_config(config),
            notifications: NotificationService::new(config),
        }
    }

    pub async fn list(&self, query: UserListQuery) -> Result<Vec<UserRecord>, AdminError> {
        Ok(self
            .users
            .list(query.role, query.status, query.limit.unwrap_or(100))
            .await?)
    }

    pub async fn set_status(
        &self,
        admin: &User,
        auth_id: &str,
        request: UpdateUserStatusRequest,
    ) -> Result<UserRecord, AdminError> {
        if admin.id == auth_id {
            return Err(AdminError::CannotModifySelf);
        }

        let record = self.users.set_status(auth_id, request.status).await?;

        match (&self.identity, request.status) {
            (Some(identity), UserStatus::Suspended) => identity.ban(auth_id).await?,
            (Some(identity), UserStatus::Active) => identity.unban(auth_id).await?,
            (None, _) => warn!("Identity provider not configured, {} not synced", auth_id),
        }

        info!("Admin {} set user {} to {}", admin.id, auth_id, request.status);

        let message = match (request.status, request.reason.as_deref()) {
            (UserStatus::Suspended, Some(reason)) => format!("Your account has been suspended: {}", reason),
            (UserStatus::Suspended, None) => "Your account has been suspended.".to_string(),
            (UserStatus::Active, _) => "Your account has been reactivated.".to_string(),
        };
        self.notifications
            .notify(
                NotificationRequest::new(auth_id, NotificationKind::AccountStatus, "Account status changed", message)
                    .with_email(record.email.clone()),
            )
            .await;

        Ok(record)
    }
}
