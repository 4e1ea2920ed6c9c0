use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::HeaderMap,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::{TokenResponse, User};
use shared_models::error::AppError;
use shared_utils::extractor::extract_bearer_token;
use shared_utils::jwt::validate_token;

use crate::models::OnboardingRequest;
use crate::services::{OnboardingService, UserService};

#[axum::debug_handler]
pub async fn validate(
    State(config): State<Arc<AppConfig>>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let TypedHeader(Authorization(bearer)) =
        bearer.ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let user = validate_token(bearer.token(), &config.auth_jwt_secret).map_err(AppError::Auth)?;

    Ok(Json(TokenResponse {
        valid: true,
        role: Some(user.role().to_string()),
        user_id: user.id,
        email: user.email,
    }))
}

/// Always 200; reports whether the presented token is usable.
#[axum::debug_handler]
pub async fn verify(State(config): State<Arc<AppConfig>>, headers: HeaderMap) -> Json<Value> {
    debug!("Verifying token");

    let valid = extract_bearer_token(&headers)
        .ok()
        .is_some_and(|token| validate_token(&token, &config.auth_jwt_secret).is_ok());

    Json(json!({ "valid": valid }))
}

#[axum::debug_handler]
pub async fn me(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = UserService::new(&config);

    let record = service.get_or_create(&user).await?;

    Ok(Json(json!({
        "user": record,
        "onboarded": record.is_onboarded()
    })))
}

#[axum::debug_handler]
pub async fn onboarding(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<OnboardingRequest>,
) -> Result<Json<Value>, AppError> {
    let service = OnboardingService::new(&config);

    let (record, profile) = service.onboard(&user, request).await?;

    Ok(Json(json!({
        "user": record,
        "role": record.role,
        "profile": profile
    })))
}
