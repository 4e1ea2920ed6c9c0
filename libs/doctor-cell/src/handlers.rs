use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::rbac::require_role;
use shared_utils::validation::parse_date;

use crate::models::{
    AvailabilityQuery, CreateApplicationRequest, DoctorSearchQuery, SetAvailabilityRequest, SlotQuery,
    UpdateDoctorRequest,
};
use crate::services::{ApplicationService, AvailabilityService, DoctorService, CONSULTATION_MINUTES};

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_doctors(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<DoctorSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&config);

    let doctors = service
        .list_verified(query.specialty.as_deref(), query.limit.unwrap_or(50))
        .await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(config): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&config);

    let doctor = service.get_public(&doctor_id).await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn get_doctor_slots(
    State(config): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let date = parse_date("date", &query.date)?;
    let timezone = query.timezone.unwrap_or_else(|| "UTC".to_string());
    let service = AvailabilityService::new(&config);

    let slots = service.available_slots(&doctor_id, date, &timezone).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "timezone": timezone,
        "duration_minutes": CONSULTATION_MINUTES,
        "slots": slots
    })))
}

// ==============================================================================
// DOCTOR HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_my_doctor_profile(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Doctor])?;
    let service = DoctorService::new(&config);

    let doctor = service.get_by_user(&user.id).await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn update_my_doctor_profile(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Doctor])?;
    let service = DoctorService::new(&config);

    let doctor = service.update_profile(&user.id, request).await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn set_my_availability(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<SetAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Doctor])?;
    let service = AvailabilityService::new(&config);

    let timezone = request.timezone.clone();
    let local = request.slots.clone();
    let doctor = service.set_availability(&user.id, request).await?;

    Ok(Json(json!({
        "timezone": timezone,
        "slots": local,
        "utc_slots": doctor.availability
    })))
}

#[axum::debug_handler]
pub async fn get_my_availability(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Doctor])?;
    let service = AvailabilityService::new(&config);

    let (timezone, slots) = service.get_availability(&user.id, query.timezone.as_deref()).await?;

    Ok(Json(json!({
        "timezone": timezone,
        "slots": slots
    })))
}

#[axum::debug_handler]
pub async fn submit_application(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateApplicationRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Doctor])?;
    let service = ApplicationService::new(&config);

    let application = service.submit(&user.id, request).await?;

    Ok(Json(json!(application)))
}

#[axum::debug_handler]
pub async fn get_my_applications(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Doctor])?;
    let service = ApplicationService::new(&config);

    let applications = service.list_for_user(&user.id).await?;

    Ok(Json(json!({
        "applications": applications,
        "total": applications.len()
    })))
}
