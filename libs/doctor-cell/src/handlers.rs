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

use crate::models::UpdateDoctorRequest;
use crate::services::DoctorService;

#[axum::debug_handler]
pub async fn list_doctors(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&config);
    let doctors = service.list_doctors(auth.token()).await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&config);
    let doctor = service.get_doctor(doctor_id, auth.token()).await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = DoctorService::new(&config);
    let scope = resolve_scope(service.supabase(), &user, token).await?;

    let doctor = service.update_doctor(&scope, doctor_id, request, token).await?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor,
        "message": "Doctor profile updated"
    })))
}

#[axum::debug_handler]
pub async fn search_by_specialization(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(specialization): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&config);
    let doctors = service
        .search_by_specialization(&specialization, auth.token())
        .await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_availability(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&config);
    let availability = service.get_availability(doctor_id, auth.token()).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "availability": availability,
        "working_days": availability.working_days()
    })))
}
