// libs/billing-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn billing_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/", get(handlers::list_bills).post(handlers::create_bill))
        .route("/{bill_id}", get(handlers::get_bill))
        .route("/{bill_id}/payment", put(handlers::update_payment))
        .route(
            "/{bill_id}/payment-proof",
            post(handlers::upload_payment_proof)
                .layer(DefaultBodyLimit::max(state.max_upload_bytes)),
        )
        .route("/{bill_id}/verify-payment", put(handlers::verify_payment))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
