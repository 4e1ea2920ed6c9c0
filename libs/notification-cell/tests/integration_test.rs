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

use notification_cell::router::notification_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockDatabaseResponses, TestConfig, TestUser};

fn app(config: AppConfig) -> Router {
    notification_routes(Arc::new(config))
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_list_requires_authentication() {
    let response = app(TestConfig::demo())
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "unauthorized");
    assert_eq!(json["message"], "Missing authorization header");
}

#[tokio::test]
async fn test_list_notifications_counts_unread() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("patient@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/notifications"))
        .and(query_param("user_id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDatabaseResponses::notification(&user.id, false),
            MockDatabaseResponses::notification(&user.id, true),
        ])))
        .mount(&mock_server)
        .await;

    let response = app(TestConfig::with_database(&mock_server.uri()))
        .oneshot(
            Request::builder()
                .uri("/")
                .header("authorization", JwtTestUtils::bearer(&user))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total"], 2);
    assert_eq!(json["unread"], 1);
}

#[tokio::test]
async fn test_mark_read_not_found() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("patient@example.com");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let response = app(TestConfig::with_database(&mock_server.uri()))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/{}/read", uuid::Uuid::new_v4()))
                .header("authorization", JwtTestUtils::bearer(&user))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_mark_all_read_reports_updated_rows() {
    let mock_server = MockServer::start().await;
    let user = TestUser::doctor("doctor@example.com");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/notifications"))
        .and(query_param("read", "eq.false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDatabaseResponses::notification(&user.id, true),
            MockDatabaseResponses::notification(&user.id, true),
            MockDatabaseResponses::notification(&user.id, true),
        ])))
        .mount(&mock_server)
        .await;

    let response = app(TestConfig::with_database(&mock_server.uri()))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/read-all")
                .header("authorization", JwtTestUtils::bearer(&user))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["updated"], 3);
}

#[tokio::test]
async fn test_demo_mode_returns_synthetic_notifications() {
    let user = TestUser::patient("patient@example.com");

    let response = app(TestConfig::demo())
        .oneshot(
            Request::builder()
                .uri("/?unread_only=true")
                .header("authorization", JwtTestUtils::bearer(&user))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["notifications"][0]["user_id"], user.id);
}
