// libs/chatbot-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::responder::{CannedResponder, ChatResponder};

/// Router state: the app config plus the responder answering questions.
#[derive(Clone)]
pub struct ChatbotState {
    pub config: Arc<AppConfig>,
    pub responder: Arc<dyn ChatResponder>,
}

pub fn chatbot_routes(state: Arc<AppConfig>) -> Router {
    chatbot_routes_with_responder(state, Arc::new(CannedResponder::new()))
}

pub fn chatbot_routes_with_responder(config: Arc<AppConfig>, responder: Arc<dyn ChatResponder>) -> Router {
    let state = ChatbotState {
        config: config.clone(),
        responder,
    };

    // Patients only; enforced per handler once the scope is resolved
    let protected_routes = Router::new()
        .route("/", post(handlers::ask))
        .route("/history", get(handlers::get_history).delete(handlers::clear_history))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
