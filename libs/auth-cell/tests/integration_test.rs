use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::auth_routes;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser, TEST_JWT_SECRET};

fn app(mock_server: &MockServer) -> Router {
    auth_routes(TestConfig::with_supabase_url(&mock_server.uri()).to_arc())
}

fn request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_validate_returns_token_claims() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");

    let response = app(&mock_server)
        .oneshot(request("POST", "/validate", &doctor.token()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["valid"], true);
    assert_eq!(body["user_id"], doctor.id);
    assert_eq!(body["role"], "doctor");
}

#[tokio::test]
async fn test_validate_rejects_bad_signature() {
    let mock_server = MockServer::start().await;
    let token = JwtTestUtils::create_invalid_signature_token(&TestUser::default());

    let response = app(&mock_server)
        .oneshot(request("POST", "/validate", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_verify_answers_false_for_expired_token() {
    let mock_server = MockServer::start().await;
    let token = JwtTestUtils::create_expired_token(&TestUser::default(), TEST_JWT_SECRET);

    let response = app(&mock_server)
        .oneshot(request("POST", "/verify", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "valid": false }));
}

#[tokio::test]
async fn test_me_includes_linked_patient_profile() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let patient_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("user_id", format!("eq.{}", patient.id)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([MockSupabaseResponses::profile_id_response(&patient_id)])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = app(&mock_server)
        .oneshot(request("GET", "/me", &patient.token()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["email"], "patient@example.com");
    assert_eq!(body["role"], "patient");
    assert_eq!(body["profile_id"], patient_id);
}

#[tokio::test]
async fn test_me_for_admin_skips_profile_lookup() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com");

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let response = app(&mock_server)
        .oneshot(request("GET", "/me", &admin.token()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["role"], "admin");
    assert!(body["profile_id"].is_null());
}

#[tokio::test]
async fn test_me_requires_a_token() {
    let mock_server = MockServer::start().await;

    let response = app(&mock_server)
        .oneshot(Request::builder().uri("/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
