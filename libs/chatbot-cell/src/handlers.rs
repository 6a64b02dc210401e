// libs/chatbot-cell/src/handlers.rs
use axum::{
    extract::{Extension, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::access::resolve_scope;

use crate::models::AskRequest;
use crate::router::ChatbotState;
use crate::services::history::ChatbotService;

fn service(state: &ChatbotState) -> ChatbotService {
    ChatbotService::new(&state.config, state.responder.clone())
}

#[axum::debug_handler(state = ChatbotState)]
pub async fn get_history(
    State(state): State<ChatbotState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = service(&state);
    let scope = resolve_scope(service.supabase(), &user, token).await?;

    let messages = service.history(&scope, token).await?;

    Ok(Json(json!({ "messages": messages })))
}

#[axum::debug_handler(state = ChatbotState)]
pub async fn ask(
    State(state): State<ChatbotState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<AskRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = service(&state);
    let scope = resolve_scope(service.supabase(), &user, token).await?;

    let answer = service.ask(&scope, request, token).await?;

    Ok(Json(json!(answer)))
}

#[axum::debug_handler(state = ChatbotState)]
pub async fn clear_history(
    State(state): State<ChatbotState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = service(&state);
    let scope = resolve_scope(service.supabase(), &user, token).await?;

    service.clear_history(&scope, token).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Chat history cleared successfully"
    })))
}
