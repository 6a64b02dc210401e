use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_doctors))
        .route(
            "/search/specialization/{specialization}",
            get(handlers::search_by_specialization),
        )
        .route("/{doctor_id}", get(handlers::get_doctor).put(handlers::update_doctor))
        .route("/{doctor_id}/availability", get(handlers::get_availability))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
