use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::NotificationListQuery;
use crate::services::NotificationService;

#[axum::debug_handler]
pub async fn list_notifications(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = NotificationService::new(&config);

    let notifications = service
        .list_for_user(&user.id, query.unread_only.unwrap_or(false), query.limit.unwrap_or(50))
        .await?;
    let unread = notifications.iter().filter(|n| !n.read).count();

    Ok(Json(json!({
        "notifications": notifications,
        "unread": unread,
        "total": notifications.len()
    })))
}

#[axum::debug_handler]
pub async fn mark_notification_read(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = NotificationService::new(&config);

    let notification = service.mark_read(&user.id, notification_id).await?;

    Ok(Json(json!(notification)))
}

#[axum::debug_handler]
pub async fn mark_all_notifications_read(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = NotificationService::new(&config);

    let updated = service.mark_all_read(&user.id).await?;

    Ok(Json(json!({ "updated": updated })))
}
