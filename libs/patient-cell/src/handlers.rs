use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::access::resolve_scope;

use crate::models::UpdatePatientRequest;
use crate::services::PatientService;

#[axum::debug_handler]
pub async fn list_patients(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = PatientService::new(&config);
    let scope = resolve_scope(service.supabase(), &user, token).await?;

    let patients = service.list_patients(&scope, token).await?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len()
    })))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = PatientService::new(&config);
    let scope = resolve_scope(service.supabase(), &user, token).await?;

    let patient = service.get_patient(&scope, patient_id, token).await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = PatientService::new(&config);
    let scope = resolve_scope(service.supabase(), &user, token).await?;

    let patient = service.update_patient(&scope, patient_id, request, token).await?;

    Ok(Json(json!({
        "success": true,
        "patient": patient,
        "message": "Patient profile updated"
    })))
}

#[axum::debug_handler]
pub async fn search_patients(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(query): Path<String>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = PatientService::new(&config);
    let scope = resolve_scope(service.supabase(), &user, token).await?;

    let patients = service.search_patients(&scope, &query, token).await?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len()
    })))
}
