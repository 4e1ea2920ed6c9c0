use std::sync::Arc;

use axum::{middleware, routing::get, Json, Router};
use serde_json::json;

use admin_cell::admin_routes;
use appointment_cell::appointment_routes;
use auth_cell::auth_routes;
use doctor_cell::doctor_routes;
use notification_cell::router::notification_routes;
use patient_cell::patient_routes;
use payment_cell::payment_routes;
use shared_config::AppConfig;
use shared_utils::rate_limit::{rate_limit_middleware, RateLimiter};
use video_conferencing_cell::video_routes;

pub fn create_router(state: Arc<AppConfig>, limiter: Arc<RateLimiter>) -> Router {
    let services = json!({
        "database": state.is_database_configured(),
        "auth": state.is_auth_configured(),
        "identity": state.is_identity_configured(),
        "payments": state.is_payments_configured(),
        "video": state.is_video_configured(),
        "email": state.is_email_configured(),
    });

    let api = Router::new()
        .nest("/auth", auth_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/payments", payment_routes(state.clone()))
        .nest("/video", video_routes(state.clone()))
        .nest("/notifications", notification_routes(state.clone()))
        .nest("/admin", admin_routes(state));

    Router::new()
        .route("/", get(|| async { "Telehealth API is running!" }))
        .route(
            "/health",
            get(move || {
                let services = services.clone();
                async move { Json(json!({ "status": "ok", "services": services })) }
            }),
        )
        .nest("/api", api)
        .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use shared_utils::rate_limit::RateLimitConfig;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(max_requests: u32) -> Router {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(60),
        }));
        create_router(Arc::new(AppConfig::default()), limiter)
    }

    #[tokio::test]
    async fn health_reports_demo_mode() {
        let response = app(10)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "10");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["services"]["database"], false);
    }

    #[tokio::test]
    async fn cells_are_mounted_under_api() {
        let response = app(10)
            .oneshot(Request::builder().uri("/api/payments/packages").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app(10)
            .oneshot(Request::builder().uri("/api/appointments").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn excess_requests_are_limited() {
        let app = app(1);
        let request = || {
            Request::builder()
                .uri("/")
                .header("x-forwarded-for", "203.0.113.9")
                .body(Body::empty())
                .unwrap()
        };

        assert_eq!(app.clone().oneshot(request()).await.unwrap().status(), StatusCode::OK);
        assert_eq!(app.oneshot(request()).await.unwrap().status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
