use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_database::SupabaseClient;
use shared_models::error::AppError;
use shared_utils::access::{resolve_scope, CallerScope};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

#[tokio::test]
async fn test_patient_resolves_to_profile_row() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("patient@example.com");
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("user_id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::profile_id_response(&patient_id.to_string())
        ])))
        .mount(&mock_server)
        .await;

    let supabase = SupabaseClient::new(&TestConfig::with_supabase_url(&mock_server.uri()).to_app_config());
    let scope = resolve_scope(&supabase, &user.to_user(), "token").await.unwrap();

    assert_eq!(scope, CallerScope::Patient { patient_id });
}

#[tokio::test]
async fn test_doctor_without_profile_is_not_found() {
    let mock_server = MockServer::start().await;
    let user = TestUser::doctor("doctor@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let supabase = SupabaseClient::new(&TestConfig::with_supabase_url(&mock_server.uri()).to_app_config());
    let result = resolve_scope(&supabase, &user.to_user(), "token").await;

    assert_matches!(result, Err(AppError::NotFound(msg)) if msg == "Doctor profile not found");
}

#[tokio::test]
async fn test_admin_needs_no_lookup() {
    // No mocks mounted: any store call would fail the resolution.
    let mock_server = MockServer::start().await;
    let user = TestUser::admin("admin@example.com");

    let supabase = SupabaseClient::new(&TestConfig::with_supabase_url(&mock_server.uri()).to_app_config());
    let scope = resolve_scope(&supabase, &user.to_user(), "token").await.unwrap();

    assert_eq!(scope, CallerScope::Admin);
}

#[tokio::test]
async fn test_unknown_role_is_forbidden() {
    let mock_server = MockServer::start().await;
    let user = TestUser::new("someone@example.com", "authenticated");

    let supabase = SupabaseClient::new(&TestConfig::with_supabase_url(&mock_server.uri()).to_app_config());
    let result = resolve_scope(&supabase, &user.to_user(), "token").await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}
