use std::sync::Arc;

use axum::{
    extract::{Extension, Json, State},
    http::HeaderMap,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Role, TokenResponse, User};
use shared_models::error::AppError;
use shared_utils::access::lookup_profile_id;
use shared_utils::jwt;

fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

pub async fn validate_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = extract_bearer_token(&headers)?;
    let user = jwt::validate_token(token, &config.supabase_jwt_secret).map_err(AppError::Auth)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

/// Never fails on a bad token; reports `valid: false` instead.
pub async fn verify_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    debug!("Verifying token");

    let token = extract_bearer_token(&headers)?;
    let valid = match jwt::validate_token(token, &config.supabase_jwt_secret) {
        Ok(_) => true,
        Err(reason) => {
            debug!("Token rejected: {}", reason);
            false
        }
    };

    Ok(Json(json!({ "valid": valid })))
}

#[axum::debug_handler]
pub async fn current_user(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let role = user.app_role();

    let table = match role {
        Some(Role::Doctor) => Some("doctors"),
        Some(Role::Patient) => Some("patients"),
        Some(Role::Admin) | None => None,
    };

    let profile_id = match table {
        Some(table) => {
            let supabase = SupabaseClient::new(&config);
            let id = lookup_profile_id(&supabase, table, &user.id, auth.token()).await?;
            if id.is_none() {
                warn!("User {} has no row in {}", user.id, table);
            }
            id
        }
        None => None,
    };

    Ok(Json(json!({
        "id": user.id,
        "email": user.email,
        "role": role,
        "profile_id": profile_id
    })))
}
