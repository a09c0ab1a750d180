use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::admin_middleware;

use crate::handlers;

/// Mounted under `/v1/admin/doctors`.
pub fn doctor_admin_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_doctors).post(handlers::create_doctor))
        .route("/statistics", get(handlers::doctor_statistics))
        .route("/specializations", get(handlers::admin_specializations))
        .route(
            "/{doctor_id}",
            get(handlers::get_doctor)
                .put(handlers::update_doctor)
                .delete(handlers::delete_doctor),
        )
        .route("/{doctor_id}/activate", post(handlers::activate_doctor))
        .route("/{doctor_id}/deactivate", post(handlers::deactivate_doctor))
        .layer(middleware::from_fn_with_state(state.clone(), admin_middleware))
        .with_state(state)
}

/// Mounted under `/v1/doctors`.
pub fn doctor_public_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::public_doctors))
        .route("/featured", get(handlers::featured_doctors))
        .route("/specializations", get(handlers::public_specializations))
        .route("/{doctor_id}", get(handlers::public_doctor))
        .with_state(state)
}
