use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::router::auth_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockDatabaseResponses, TestConfig, TestUser};

fn create_test_app(config: AppConfig) -> Router {
    auth_routes(Arc::new(config))
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn onboarding_request(user: &TestUser, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/onboarding")
        .header("authorization", JwtTestUtils::bearer(user))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_validate_token_endpoint() {
    let user = TestUser::patient("test@example.com");

    let response = create_test_app(TestConfig::demo())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/validate")
                .header("authorization", JwtTestUtils::bearer(&user))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["valid"], true);
    assert_eq!(json["user_id"], user.id);
    assert_eq!(json["email"], user.email);
    assert_eq!(json["role"], "patient");
}

#[tokio::test]
async fn test_validate_token_endpoint_unauthorized() {
    let response = create_test_app(TestConfig::demo())
        .oneshot(Request::builder().method("POST").uri("/validate").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "unauthorized");
}

#[tokio::test]
async fn test_validate_rejects_bad_signature() {
    let user = TestUser::patient("test@example.com");
    let token = JwtTestUtils::create_invalid_signature_token(&user);

    let response = create_test_app(TestConfig::demo())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/validate")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_verify_token_endpoint_valid() {
    let user = TestUser::doctor("doctor@example.com");

    let response = create_test_app(TestConfig::demo())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/verify")
                .header("authorization", JwtTestUtils::bearer(&user))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["valid"], true);
}

#[tokio::test]
async fn test_verify_token_endpoint_invalid() {
    for header in [
        Some(format!("Bearer {}", JwtTestUtils::create_malformed_token())),
        Some(format!(
            "Bearer {}",
            JwtTestUtils::create_expired_token(&TestUser::default(), &TestConfig::default().jwt_secret)
        )),
        None,
    ] {
        let mut request = Request::builder().method("POST").uri("/verify");
        if let Some(header) = header {
            request = request.header("authorization", header);
        }

        let response = create_test_app(TestConfig::demo())
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["valid"], false);
    }
}

#[tokio::test]
async fn test_me_creates_record_on_first_call() {
    let mock_server = MockServer::start().await;
    let user = TestUser::unassigned("new@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!([MockDatabaseResponses::user_record(&user.id, "unassigned", "active")])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = create_test_app(TestConfig::with_database(&mock_server.uri()))
        .oneshot(
            Request::builder()
                .uri("/me")
                .header("authorization", JwtTestUtils::bearer(&user))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["onboarded"], false);
    assert_eq!(json["user"]["auth_id"], user.id);
}

#[tokio::test]
async fn test_me_unauthorized() {
    let response = create_test_app(TestConfig::demo())
        .oneshot(Request::builder().uri("/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_onboarding_patient_grants_credits() {
    let mock_server = MockServer::start().await;
    let user = TestUser::unassigned("new@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([MockDatabaseResponses::user_record(&user.id, "unassigned", "active")])),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .and(body_partial_json(json!({ "credits": 2 })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([MockDatabaseResponses::patient(&user.id, 2)])))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/transactions"))
        .and(body_partial_json(json!({ "kind": "initial_grant", "credits": 2 })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!([MockDatabaseResponses::transaction(&user.id, "initial_grant", 2)])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .and(body_partial_json(json!({ "role": "patient" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([MockDatabaseResponses::user_record(&user.id, "patient", "active")])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = create_test_app(TestConfig::with_database(&mock_server.uri()))
        .oneshot(onboarding_request(&user, json!({ "role": "patient" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["role"], "patient");
    assert_eq!(json["profile"]["credits"], 2);
}

#[tokio::test]
async fn test_onboarding_twice_conflicts() {
    let mock_server = MockServer::start().await;
    let user = TestUser::unassigned("new@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([MockDatabaseResponses::user_record(&user.id, "doctor", "active")])),
        )
        .mount(&mock_server)
        .await;

    let response = create_test_app(TestConfig::with_database(&mock_server.uri()))
        .oneshot(onboarding_request(&user, json!({ "role": "patient" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_onboarding_doctor_pushes_role_to_identity_provider() {
    let identity = MockServer::start().await;
    let user = TestUser::unassigned("doc@example.com");

    Mock::given(method("PATCH"))
        .and(path(format!("/users/{}/metadata", user.id)))
        .and(body_partial_json(json!({ "public_metadata": { "role": "doctor" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": user.id })))
        .expect(1)
        .mount(&identity)
        .await;

    let config = AppConfig {
        identity_api_url: identity.uri(),
        identity_secret_key: "sk_test".to_string(),
        ..TestConfig::demo()
    };

    let response = create_test_app(config)
        .oneshot(onboarding_request(
            &user,
            json!({ "role": "doctor", "specialty": "Dermatology", "timezone": "Europe/Berlin" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["profile"]["verification_status"], "pending");
    assert_eq!(json["profile"]["timezone"], "Europe/Berlin");
}

#[tokio::test]
async fn test_onboarding_rejects_admin_and_missing_specialty() {
    let user = TestUser::unassigned("new@example.com");

    let admin = create_test_app(TestConfig::demo())
        .oneshot(onboarding_request(&user, json!({ "role": "admin" })))
        .await
        .unwrap();
    assert_eq!(admin.status(), StatusCode::BAD_REQUEST);

    let doctor = create_test_app(TestConfig::demo())
        .oneshot(onboarding_request(&user, json!({ "role": "doctor" })))
        .await
        .unwrap();
    assert_eq!(doctor.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_nonexistent_routes() {
    let response = create_test_app(TestConfig::demo())
        .oneshot(Request::builder().uri("/nonexistent").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
