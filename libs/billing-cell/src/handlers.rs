// libs/billing-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::access::resolve_scope;

use crate::models::{CreateBillRequest, UpdatePaymentRequest};
use crate::services::billing::BillingService;
use crate::services::proof::read_proof_upload;

#[axum::debug_handler]
pub async fn list_bills(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = BillingService::new(&state);
    let scope = resolve_scope(service.supabase(), &user, token).await?;

    let bills = service.list_bills(&scope, token).await?;

    Ok(Json(json!({
        "bills": bills,
        "total": bills.len()
    })))
}

#[axum::debug_handler]
pub async fn create_bill(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateBillRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let token = auth.token();
    let service = BillingService::new(&state);
    let scope = resolve_scope(service.supabase(), &user, token).await?;

    let bill = service.create_bill(&scope, request, token).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "bill": bill,
            "message": "Bill created successfully"
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_bill(
    State(state): State<Arc<AppConfig>>,
    Path(bill_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = BillingService::new(&state);
    let scope = resolve_scope(service.supabase(), &user, token).await?;

    let bill = service.get_scoped_bill(&scope, bill_id, token).await?;

    Ok(Json(json!(bill)))
}

#[axum::debug_handler]
pub async fn update_payment(
    State(state): State<Arc<AppConfig>>,
    Path(bill_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = BillingService::new(&state);
    let scope = resolve_scope(service.supabase(), &user, token).await?;

    let bill = service.update_payment(&scope, bill_id, request, token).await?;

    Ok(Json(json!({
        "success": true,
        "bill": bill,
        "message": "Payment status updated"
    })))
}

#[axum::debug_handler]
pub async fn upload_payment_proof(
    State(state): State<Arc<AppConfig>>,
    Path(bill_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = BillingService::new(&state);
    let scope = resolve_scope(service.supabase(), &user, token).await?;
    scope.require(&[Role::Patient])?;

    let upload = read_proof_upload(multipart).await?;
    let bill = service.attach_payment_proof(&scope, bill_id, upload, token).await?;

    Ok(Json(json!({
        "success": true,
        "payment_proof": bill.payment_proof,
        "bill": bill,
        "message": "Payment proof uploaded"
    })))
}

#[axum::debug_handler]
pub async fn verify_payment(
    State(state): State<Arc<AppConfig>>,
    Path(bill_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = BillingService::new(&state);
    let scope = resolve_scope(service.supabase(), &user, token).await?;

    let bill = service.verify_payment(&scope, bill_id, token).await?;

    Ok(Json(json!({
        "success": true,
        "bill": bill,
        "message": "Payment verified by doctor"
    })))
}
