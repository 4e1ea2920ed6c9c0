use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;
use shared_utils::rbac::require_admin;

use crate::handlers;

pub fn admin_routes(state: Arc<AppConfig>) -> Router {
    // Admin role required everywhere; auth_middleware runs first
    Router::new()
        .route("/users", get(handlers::list_users))
        .route("/users/{user_id}/status", put(handlers::update_user_status))
        .route("/applications", get(handlers::list_applications))
        .route("/applications/{application_id}/review", post(handlers::review_application))
        .route("/doctors/pending", get(handlers::list_pending_doctors))
        .route("/doctors/{doctor_id}/verification", put(handlers::update_doctor_verification))
        .route("/stats", get(handlers::get_stats))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
