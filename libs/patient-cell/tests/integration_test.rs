use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::patient_routes;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

fn app(mock_server: &MockServer) -> Router {
    patient_routes(TestConfig::with_supabase_url(&mock_server.uri()).to_arc())
}

async fn mount_profile(mock_server: &MockServer, table: &str, user_id: &str, profile_id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/rest/v1/{}", table)))
        .and(query_param("user_id", format!("eq.{}", user_id)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([MockSupabaseResponses::profile_id_response(profile_id)])),
        )
        .mount(mock_server)
        .await;
}

fn request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token));

    match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_doctor_lists_patients() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");
    mount_profile(&mock_server, "doctors", &doctor.id, &Uuid::new_v4().to_string()).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(&Uuid::new_v4().to_string(), &Uuid::new_v4().to_string())
        ])))
        .mount(&mock_server)
        .await;

    let response = app(&mock_server)
        .oneshot(request("GET", "/", &doctor.token(), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["patients"][0]["user"]["name"], "Test Patient");
}

#[tokio::test]
async fn test_patient_cannot_list_patients() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    mount_profile(&mock_server, "patients", &patient.id, &Uuid::new_v4().to_string()).await;

    let response = app(&mock_server)
        .oneshot(request("GET", "/", &patient.token(), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_patient_reads_own_profile_only() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let patient_id = Uuid::new_v4().to_string();
    mount_profile(&mock_server, "patients", &patient.id, &patient_id).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(&patient_id, &patient.id)
        ])))
        .mount(&mock_server)
        .await;

    let own = app(&mock_server)
        .oneshot(request("GET", &format!("/{}", patient_id), &patient.token(), None))
        .await
        .unwrap();
    assert_eq!(own.status(), StatusCode::OK);

    let other = app(&mock_server)
        .oneshot(request("GET", &format!("/{}", Uuid::new_v4()), &patient.token(), None))
        .await
        .unwrap();
    assert_eq!(other.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_update_with_invalid_blood_group_is_rejected() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let patient_id = Uuid::new_v4().to_string();
    mount_profile(&mock_server, "patients", &patient.id, &patient_id).await;

    let response = app(&mock_server)
        .oneshot(request(
            "PUT",
            &format!("/{}", patient_id),
            &patient.token(),
            Some(json!({ "blood_group": "C+" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["errors"][0]["field"], "blood_group");
}

#[tokio::test]
async fn test_patient_updates_own_profile() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let patient_id = Uuid::new_v4().to_string();
    mount_profile(&mock_server, "patients", &patient.id, &patient_id).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(&patient_id, &patient.id)
        ])))
        .mount(&mock_server)
        .await;

    let mut updated = MockSupabaseResponses::patient_response(&patient_id, &patient.id);
    updated["address"] = json!("4 Quay Street");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patients"))
        .and(body_partial_json(json!({ "address": "4 Quay Street", "gender": "female" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([updated])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = app(&mock_server)
        .oneshot(request(
            "PUT",
            &format!("/{}", patient_id),
            &patient.token(),
            Some(json!({ "address": "4 Quay Street", "gender": "female" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["patient"]["address"], "4 Quay Street");
}

#[tokio::test]
async fn test_search_matches_user_name_or_email() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com");
    let user_id = Uuid::new_v4().to_string();
    let patient_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("role", "eq.patient"))
        .and(query_param("or", "(name.ilike.*smith*,email.ilike.*smith*)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": user_id }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("user_id", format!("in.({})", user_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(&patient_id, &user_id)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = app(&mock_server)
        .oneshot(request("GET", "/search/smith", &admin.token(), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["patients"][0]["id"], patient_id);
}

#[tokio::test]
async fn test_search_without_matches_skips_patient_query() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let response = app(&mock_server)
        .oneshot(request("GET", "/search/nobody", &admin.token(), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 0);
}
