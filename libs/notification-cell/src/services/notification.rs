use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{eq, DatabaseClient};

use crate::models::{Notification, NotificationError, NotificationKind, NotificationRequest};
use crate::services::email::{EmailMessage, EmailSender, ResendEmailClient};

const TABLE: &str = "notifications";

pub struct NotificationService {
    db: DatabaseClient,
    email: Option<Arc<dyn EmailSender>>,
    email_from: String,
}

impl NotificationService {
    pub fn new(config: &AppConfig) -> Self {
        let email = ResendEmailClient::from_config(config).map(|c| Arc::new(c) as Arc<dyn EmailSender>);
        Self {
            db: DatabaseClient::new(config),
            email,
            email_from: config.email_from.clone(),
        }
    }

    pub fn with_email_sender(config: &AppConfig, sender: Arc<dyn EmailSender>) -> Self {
        Self {
            db: DatabaseClient::new(config),
            email: Some(sender),
            email_from: config.email_from.clone(),
        }
    }

    pub async fn create(&self, request: &NotificationRequest) -> Result<Notification, NotificationError> {
        if !self.db.is_configured() {
            debug!("Demo mode: notification for {} not persisted", request.user_id);
            return Ok(Notification {
                id: Uuid::new_v4(),
                user_id: request.user_id.clone(),
                kind: request.kind,
                title: request.title.clone(),
                message: request.message.clone(),
                read: false,
                link: request.link.clone(),
                created_at: Utc::now(),
            });
        }

        let notification = self
            .db
            .insert(
                TABLE,
                json!({
                    "user_id": request.user_id,
                    "kind": request.kind,
                    "title": request.title,
                    "message": request.message,
                    "read": false,
                    "link": request.link,
                    "created_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        Ok(notification)
    }

    /// Store an in-app notification and email it when an address is known.
    /// Failures are logged and swallowed; a notification never fails the caller's operation.
    pub async fn notify(&self, request: NotificationRequest) {
        if let Err(e) = self.create(&request).await {
            warn!("Failed to store notification for {}: {}", request.user_id, e);
        }

        let (Some(sender), Some(address)) = (self.email.as_ref(), request.email.as_ref()) else {
            return;
        };

        let message = EmailMessage {
            from: self.email_from.clone(),
            to: vec![address.clone()],
            subject: request.title.clone(),
            html: format!("<p>{}</p>", request.message),
        };

        match sender.send(message).await {
            Ok(id) => debug!("Notification email {} sent to {}", id, request.user_id),
            Err(e) => warn!("Failed to email notification to {}: {}", request.user_id, e),
        }
    }

    pub async fn list_for_user(
        &self,
        user_id: &str,
        unread_only: bool,
        limit: u32,
    ) -> Result<Vec<Notification>, NotificationError> {
        if !self.db.is_configured() {
            return Ok(demo_notifications(user_id));
        }

        let mut query = format!("user_id={}&order=created_at.desc&limit={}", eq(user_id), limit.clamp(1, 100));
        if unread_only {
            query.push_str("&read=eq.false");
        }

        Ok(self.db.select(TABLE, &query).await?)
    }

    pub async fn mark_read(&self, user_id: &str, notification_id: Uuid) -> Result<Notification, NotificationError> {
        if !self.db.is_configured() {
            let mut notification = demo_notifications(user_id).remove(0);
            notification.id = notification_id;
            notification.read = true;
            return Ok(notification);
        }

        let filter = format!("id={}&user_id={}", eq(notification_id.to_string()), eq(user_id));
        let mut updated: Vec<Notification> = self.db.update(TABLE, &filter, json!({ "read": true })).await?;

        if updated.is_empty() {
            return Err(NotificationError::NotFound);
        }
        Ok(updated.remove(0))
    }

    pub async fn mark_all_read(&self, user_id: &str) -> Result<usize, NotificationError> {
        if !self.db.is_configured() {
            return Ok(0);
        }

        let filter = format!("user_id={}&read=eq.false", eq(user_id));
        let updated: Vec<Notification> = self.db.update(TABLE, &filter, json!({ "read": true })).await?;

        info!("Marked {} notifications read for {}", updated.len(), user_id);
        Ok(updated.len())
    }
}

fn demo_notifications(user_id: &str) -> Vec<Notification> {
    vec![Notification {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        kind: NotificationKind::General,
        title: "Welcome".to_string(),
        message: "This is demo data; connect a database to see real notifications.".to_string(),
        read: false,
        link: None,
        created_at: Utc::now(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::email::MockEmailSender;
    use assert_matches::assert_matches;
    use shared_utils::test_utils::{MockDatabaseResponses, TestConfig};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(email: Option<&str>) -> NotificationRequest {
        NotificationRequest::new("user_1", NotificationKind::AppointmentBooked, "Booked", "See you Monday")
            .with_email(email.map(String::from))
    }

    #[tokio::test]
    async fn notify_stores_and_emails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/notifications"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!([MockDatabaseResponses::notification("user_1", false)])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut sender = MockEmailSender::new();
        sender
            .expect_send()
            .withf(|m| m.to == vec!["p@example.com".to_string()] && m.subject == "Booked")
            .times(1)
            .returning(|_| Ok("email_1".to_string()));

        let service = NotificationService::with_email_sender(&TestConfig::with_database(&server.uri()), Arc::new(sender));
        service.notify(request(Some("p@example.com"))).await;
    }

    #[tokio::test]
    async fn notify_swallows_storage_and_email_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/notifications"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut sender = MockEmailSender::new();
        sender
            .expect_send()
            .times(1)
            .returning(|_| Err(NotificationError::Email("down".to_string())));

        let service = NotificationService::with_email_sender(&TestConfig::with_database(&server.uri()), Arc::new(sender));
        service.notify(request(Some("p@example.com"))).await;
    }

    #[tokio::test]
    async fn no_email_without_address() {
        let mut sender = MockEmailSender::new();
        sender.expect_send().times(0);

        let service = NotificationService::with_email_sender(&TestConfig::demo(), Arc::new(sender));
        service.notify(request(None)).await;
    }

    #[tokio::test]
    async fn mark_read_of_foreign_notification_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/notifications"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let service = NotificationService::new(&TestConfig::with_database(&server.uri()));
        let result = service.mark_read("user_1", Uuid::new_v4()).await;
        assert_matches!(result, Err(NotificationError::NotFound));
    }
}
