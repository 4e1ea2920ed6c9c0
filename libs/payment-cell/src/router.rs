use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn payment_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/packages", get(handlers::list_packages))
        .route("/webhook", post(handlers::handle_webhook));

    let protected_routes = Router::new()
        .route("/checkout", post(handlers::create_checkout))
        .route("/transactions", get(handlers::list_transactions))
        .route("/earnings", get(handlers::get_earnings))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
