use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;

use crate::handlers;

/// Mounted under `/v1/contact`.
pub fn contact_public_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::submit_contact))
        .route("/info", get(handlers::contact_info))
        .with_state(state)
}
