use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::admin_middleware;

use crate::handlers;

/// Mounted under `/v1/admin/services`.
pub fn service_admin_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_services).post(handlers::create_service))
        .route("/statistics", get(handlers::service_statistics))
        .route("/reorder", post(handlers::reorder_services))
        .route(
            "/{service_id}",
            get(handlers::get_service)
                .put(handlers::update_service)
                .delete(handlers::delete_service),
        )
        .route("/{service_id}/activate", post(handlers::activate_service))
        .route("/{service_id}/deactivate", post(handlers::deactivate_service))
        .layer(middleware::from_fn_with_state(state.clone(), admin_middleware))
        .with_state(state)
}

/// Mounted under `/v1/services`.
pub fn service_public_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::public_services))
        .route("/featured", get(handlers::featured_services))
        .route("/{slug}", get(handlers::public_service))
        .with_state(state)
}
