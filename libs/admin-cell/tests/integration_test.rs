use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use admin_cell::admin_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockDatabaseResponses, TestConfig, TestUser};

fn app(config: AppConfig) -> Router {
    admin_routes(Arc::new(config))
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

fn json_request(method: &str, uri: &str, user: &TestUser, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", JwtTestUtils::bearer(user))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_admin_routes_require_authentication() {
    let response = app(TestConfig::demo())
        .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_admins_are_forbidden() {
    for user in [TestUser::patient("p@example.com"), TestUser::doctor("d@example.com")] {
        let response = app(TestConfig::demo()).oneshot(get("/users", &user)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}

#[tokio::test]
async fn test_list_users_passes_filters() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("role", "eq.doctor"))
        .and(query_param("status", "eq.suspended"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDatabaseResponses::user_record("user_9", "doctor", "suspended")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = app(TestConfig::with_database(&mock_server.uri()))
        .oneshot(get("/users?role=doctor&status=suspended", &admin))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["users"][0]["status"], "suspended");
}

#[tokio::test]
async fn test_suspension_is_synced_to_identity_provider() {
    let database = MockServer::start().await;
    let identity = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .and(query_param("auth_id", "eq.user_9"))
        .and(body_partial_json(json!({ "status": "suspended" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDatabaseResponses::user_record("user_9", "patient", "suspended")
        ])))
        .expect(1)
        .mount(&database)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([MockDatabaseResponses::notification("user_9", false)])))
        .mount(&database)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/user_9/ban"))
        .and(header("authorization", "Bearer sk_identity"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "user_9", "banned": true })))
        .expect(1)
        .mount(&identity)
        .await;

    let config = AppConfig {
        identity_api_url: identity.uri(),
        identity_secret_key: "sk_identity".to_string(),
        ..TestConfig::with_database(&database.uri())
    };

    let response = app(config)
        .oneshot(json_request(
            "PUT",
            "/users/user_9/status",
            &admin,
            json!({ "status": "suspended", "reason": "Chargeback fraud" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "suspended");
}

#[tokio::test]
async fn test_admin_cannot_suspend_self() {
    let admin = TestUser::admin("admin@example.com");

    let response = app(TestConfig::demo())
        .oneshot(json_request(
            "PUT",
            &format!("/users/{}/status", admin.id),
            &admin,
            json!({ "status": "suspended" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_approval_verifies_doctor_profile() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com");
    let pending = MockDatabaseResponses::application("applicant_1", "pending");
    let application_id = pending["id"].as_str().unwrap().to_string();
    let mut approved = pending.clone();
    approved["status"] = json!("approved");

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_applications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([pending])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctor_applications"))
        .and(query_param("status", "eq.pending"))
        .and(body_partial_json(json!({ "status": "approved" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([approved])))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("user_id", "eq.applicant_1"))
        .and(body_partial_json(json!({ "verification_status": "verified" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDatabaseResponses::doctor("applicant_1", "verified")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .and(body_partial_json(json!({ "user_id": "applicant_1", "kind": "application_reviewed" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([MockDatabaseResponses::notification("applicant_1", false)])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = app(TestConfig::with_database(&mock_server.uri()))
        .oneshot(json_request(
            "POST",
            &format!("/applications/{}/review", application_id),
            &admin,
            json!({ "decision": "approve", "notes": "License verified" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["application"]["status"], "approved");
    assert_eq!(json["doctor"]["verification_status"], "verified");
}

#[tokio::test]
async fn test_reviewed_application_cannot_be_reviewed_again() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com");
    let rejected = MockDatabaseResponses::application("applicant_1", "rejected");

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_applications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([rejected.clone()])))
        .mount(&mock_server)
        .await;

    let response = app(TestConfig::with_database(&mock_server.uri()))
        .oneshot(json_request(
            "POST",
            &format!("/applications/{}/review", rejected["id"].as_str().unwrap()),
            &admin,
            json!({ "decision": "approve" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_verification_update_for_unknown_doctor() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let response = app(TestConfig::with_database(&mock_server.uri()))
        .oneshot(json_request(
            "PUT",
            "/doctors/nobody/verification",
            &admin,
            json!({ "status": "suspended" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pending_doctors_in_demo_mode() {
    let admin = TestUser::admin("admin@example.com");

    let response = app(TestConfig::demo()).oneshot(get("/doctors/pending", &admin)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["doctors"][0]["verification_status"], "pending");
}

#[tokio::test]
async fn test_stats_aggregate_counts() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.completed"))
        .respond_with(ResponseTemplate::new(206).insert_header("content-range", "0-0/12").set_body_json(json!([])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "0-0/3").set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let response = app(TestConfig::with_database(&mock_server.uri()))
        .oneshot(get("/stats", &admin))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["users"], 3);
    assert_eq!(json["doctors"]["total"], 12);
    assert_eq!(json["appointments"]["completed"], 12);
    assert_eq!(json["appointments"]["total"], 18);
}
