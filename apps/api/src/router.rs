use std::sync::Arc;

use axum::{
    Json,
    Router,
    routing::get,
};
use serde_json::json;
use tower_http::services::ServeDir;

use appointment_cell::appointment_routes;
use auth_cell::auth_routes;
use billing_cell::billing_routes;
use chatbot_cell::chatbot_routes;
use doctor_cell::doctor_routes;
use patient_cell::patient_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    let api = Router::new()
        .nest("/auth", auth_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/billing", billing_routes(state.clone()))
        .nest("/chatbot", chatbot_routes(state.clone()));

    Router::new()
        .route("/", get(|| async { "Clinic API is running!" }))
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .nest("/api", api)
        // Payment proofs are written here by the billing cell.
        .nest_service("/cover", ServeDir::new(&state.upload_dir))
}
