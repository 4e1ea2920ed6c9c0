use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::rbac::require_role;

use crate::models::UpdatePatientRequest;
use crate::services::PatientService;

#[axum::debug_handler]
pub async fn get_my_profile(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Patient])?;
    let service = PatientService::new(&config);

    let patient = service.get_by_user(&user.id).await?;

    Ok(Json(json!({
        "patient": patient,
        "email": user.email,
        "name": user.display_name(),
        "has_active_subscription": patient.has_active_subscription()
    })))
}

#[axum::debug_handler]
pub async fn update_my_profile(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Patient])?;
    let service = PatientService::new(&config);

    let patient = service.update_profile(&user.id, request).await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn get_my_credits(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Patient])?;
    let service = PatientService::new(&config);

    let patient = service.get_by_user(&user.id).await?;

    Ok(Json(json!({
        "credits": patient.credits,
        "credits_per_appointment": config.credits_per_appointment,
        "can_book": patient.credits >= config.credits_per_appointment
    })))
}
