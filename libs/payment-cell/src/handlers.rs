use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use patient_cell::CreditService;
use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::rbac::require_role;

use crate::models::{credit_packages, CheckoutRequest, TransactionQuery};
use crate::services::{CheckoutService, EarningsService, WebhookService};

#[axum::debug_handler]
pub async fn list_packages() -> Result<Json<Value>, AppError> {
    Ok(Json(json!({ "packages": credit_packages() })))
}

#[axum::debug_handler]
pub async fn create_checkout(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Patient])?;
    let service = CheckoutService::new(&config);

    let checkout = service.create_checkout(&user, &request.package_id).await?;

    Ok(Json(json!(checkout)))
}

/// Processor callback; authenticated by signature rather than session token.
#[axum::debug_handler]
pub async fn handle_webhook(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = headers.get("stripe-signature").and_then(|v| v.to_str().ok());
    let service = WebhookService::new(&config);

    let outcome = service.handle(&body, signature).await?;

    Ok(Json(json!({
        "received": true,
        "event_type": outcome.event_type,
        "processed": outcome.processed
    })))
}

#[axum::debug_handler]
pub async fn list_transactions(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Value>, AppError> {
    let service = CreditService::new(&config);

    let transactions = service
        .list_transactions(&user.id, query.kind, query.limit.unwrap_or(100))
        .await?;

    Ok(Json(json!({
        "transactions": transactions,
        "total": transactions.len()
    })))
}

#[axum::debug_handler]
pub async fn get_earnings(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Doctor])?;
    let service = EarningsService::new(&config);

    let summary = service.summary(&user.id).await?;

    Ok(Json(json!(summary)))
}
