use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    // Public directory
    let public_routes = Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .route("/{doctor_id}/slots", get(handlers::get_doctor_slots));

    // Doctor portal
    let protected_routes = Router::new()
        .route("/me", get(handlers::get_my_doctor_profile).put(handlers::update_my_doctor_profile))
        .route(
            "/me/availability",
            get(handlers::get_my_availability).put(handlers::set_my_availability),
        )
        .route("/applications", post(handlers::submit_application))
        .route("/applications/me", get(handlers::get_my_applications))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
