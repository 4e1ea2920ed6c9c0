use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::patient_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockDatabaseResponses, TestConfig, TestUser};

fn app(config: AppConfig) -> Router {
    patient_routes(Arc::new(config))
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn get(uri: &str, user: &TestUser) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", JwtTestUtils::bearer(user))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_profile_requires_authentication() {
    let response = app(TestConfig::demo())
        .oneshot(Request::builder().uri("/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_expired_token(&user, &TestConfig::default().jwt_secret);

    let response = app(TestConfig::demo())
        .oneshot(
            Request::builder()
                .uri("/me")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_doctor_cannot_read_patient_profile() {
    let user = TestUser::doctor("doctor@example.com");

    let response = app(TestConfig::demo()).oneshot(get("/me", &user)).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "forbidden");
}

#[tokio::test]
async fn test_get_profile_from_database() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("patient@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("user_id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([MockDatabaseResponses::patient(&user.id, 7)])))
        .mount(&mock_server)
        .await;

    let response = app(TestConfig::with_database(&mock_server.uri()))
        .oneshot(get("/me", &user))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["patient"]["credits"], 7);
    assert_eq!(json["email"], "patient@example.com");
    assert_eq!(json["has_active_subscription"], false);
}

#[tokio::test]
async fn test_missing_profile_is_not_found() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("patient@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let response = app(TestConfig::with_database(&mock_server.uri()))
        .oneshot(get("/me", &user))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_credits_report_booking_eligibility() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("patient@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([MockDatabaseResponses::patient(&user.id, 1)])))
        .mount(&mock_server)
        .await;

    let response = app(TestConfig::with_database(&mock_server.uri()))
        .oneshot(get("/me/credits", &user))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["credits"], 1);
    assert_eq!(json["credits_per_appointment"], 2);
    assert_eq!(json["can_book"], false);
}

#[tokio::test]
async fn test_update_rejects_invalid_date_of_birth() {
    let user = TestUser::patient("patient@example.com");

    let response = app(TestConfig::demo())
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/me")
                .header("authorization", JwtTestUtils::bearer(&user))
                .header("content-type", "application/json")
                .body(Body::from(json!({ "date_of_birth": "01/02/1990" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "validation_error");
}

#[tokio::test]
async fn test_update_phone_in_demo_mode() {
    let user = TestUser::patient("patient@example.com");

    let response = app(TestConfig::demo())
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/me")
                .header("authorization", JwtTestUtils::bearer(&user))
                .header("content-type", "application/json")
                .body(Body::from(json!({ "phone": "+15551234567" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["phone"], "+15551234567");
}
