use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use auth_cell::UserListQuery;
use doctor_cell::ReviewApplicationRequest;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{ApplicationListQuery, UpdateUserStatusRequest, UpdateVerificationRequest};
use crate::services::{AdminUserService, ReviewService, StatsService};

// ==============================================================================
// USERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_users(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AdminUserService::new(&config);

    let users = service.list(query).await?;

    Ok(Json(json!({
        "users": users,
        "total": users.len()
    })))
}

#[axum::debug_handler]
pub async fn update_user_status(
    State(config): State<Arc<AppConfig>>,
    Extension(admin): Extension<User>,
    Path(user_id): Path<String>,
    Json(request): Json<UpdateUserStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AdminUserService::new(&config);

    let user = service.set_status(&admin, &user_id, request).await?;

    Ok(Json(json!(user)))
}

// ==============================================================================
// DOCTOR APPLICATIONS & VERIFICATION
// ==============================================================================

#[axum::debug_handler]
pub async fn list_applications(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<ApplicationListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ReviewService::new(&config);

    let applications = service.list_applications(query.status).await?;

    Ok(Json(json!({
        "applications": applications,
        "total": applications.len()
    })))
}

#[axum::debug_handler]
pub async fn review_application(
    State(config): State<Arc<AppConfig>>,
    Extension(admin): Extension<User>,
    Path(application_id): Path<Uuid>,
    Json(request): Json<ReviewApplicationRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ReviewService::new(&config);

    let (application, doctor) = service.review_application(&admin, application_id, request).await?;

    Ok(Json(json!({
        "application": application,
        "doctor": doctor
    })))
}

#[axum::debug_handler]
pub async fn list_pending_doctors(State(config): State<Arc<AppConfig>>) -> Result<Json<Value>, AppError> {
    let service = ReviewService::new(&config);

    let doctors = service.list_pending_doctors().await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn update_doctor_verification(
    State(config): State<Arc<AppConfig>>,
    Extension(admin): Extension<User>,
    Path(doctor_id): Path<String>,
    Json(request): Json<UpdateVerificationRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ReviewService::new(&config);

    let doctor = service.set_verification(&admin, &doctor_id, request).await?;

    Ok(Json(json!(doctor)))
}

// ==============================================================================
// STATS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_stats(State(config): State<Arc<AppConfig>>) -> Result<Json<Value>, AppError> {
    let service = StatsService::new(&config);

    let stats = service.platform_stats().await?;

    Ok(Json(json!(stats)))
}
