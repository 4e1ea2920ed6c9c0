use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::VideoTokenRequest;
use crate::services::VideoSessionService;

#[axum::debug_handler]
pub async fn create_token(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<VideoTokenRequest>,
) -> Result<Json<Value>, AppError> {
    let service = VideoSessionService::new(&config)?;

    let response = service.issue_token(&user, request.appointment_id).await?;

    Ok(Json(json!(response)))
}

#[axum::debug_handler]
pub async fn health(State(config): State<Arc<AppConfig>>) -> Result<Json<Value>, AppError> {
    let service = VideoSessionService::new(&config)?;

    Ok(Json(json!({
        "provider": "vonage",
        "configured": service.is_configured(),
        "application_id": service.application_id(),
        "demo": !service.is_configured()
    })))
}
