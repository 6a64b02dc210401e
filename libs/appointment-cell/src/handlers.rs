// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, State, Extension},
    http::StatusCode,
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

use crate::models::{
    AppointmentAction, ApproveAppointmentRequest, CreateAppointmentRequest,
    UpdateAppointmentRequest,
};
use crate::services::booking::AppointmentService;

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AppointmentService::new(&state);
    let scope = resolve_scope(service.supabase(), &user, token).await?;

    let appointments = service.list_appointments(&scope, token).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AppointmentService::new(&state);
    let scope = resolve_scope(service.supabase(), &user, token).await?;

    let appointment = service.get_scoped_appointment(&scope, appointment_id, token).await?;

    Ok(Json(json!(appointment)))
}

/// Patients book for themselves; admins book on behalf of a named patient.
#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let token = auth.token();
    let service = AppointmentService::new(&state);
    let scope = resolve_scope(service.supabase(), &user, token).await?;

    let appointment = service.book_appointment(&scope, request, token).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment,
            "message": "Appointment booked successfully"
        })),
    ))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AppointmentService::new(&state);
    let scope = resolve_scope(service.supabase(), &user, token).await?;

    let appointment = service
        .update_appointment(&scope, appointment_id, request, token)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AppointmentService::new(&state);
    let scope = resolve_scope(service.supabase(), &user, token).await?;

    let appointment = service
        .apply_action(&scope, appointment_id, AppointmentAction::Cancel, token)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled successfully"
    })))
}

#[axum::debug_handler]
pub async fn approve_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ApproveAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AppointmentService::new(&state);
    let scope = resolve_scope(service.supabase(), &user, token).await?;

    let action = if request.approve {
        AppointmentAction::Approve
    } else {
        AppointmentAction::Reject
    };
    let appointment = service.apply_action(&scope, appointment_id, action, token).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": if request.approve { "Appointment approved" } else { "Appointment rejected" }
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AppointmentService::new(&state);
    let scope = resolve_scope(service.supabase(), &user, token).await?;

    let appointment = service
        .apply_action(&scope, appointment_id, AppointmentAction::Complete, token)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment marked as completed"
    })))
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AppointmentService::new(&state);
    let scope = resolve_scope(service.supabase(), &user, token).await?;

    let appointment = service
        .apply_action(&scope, appointment_id, AppointmentAction::MarkNoShow, token)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment marked as no-show"
    })))
}
