use std::sync::Arc;

use axum::{routing::get, Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use appointment_cell::{appointment_admin_routes, appointment_public_routes};
use auth_cell::auth_routes;
use blog_cell::{blog_admin_routes, blog_public_routes};
use contact_cell::contact_public_routes;
use doctor_cell::{doctor_admin_routes, doctor_public_routes};
use service_cell::{service_admin_routes, service_public_routes};
use shared_config::AppConfig;

async fn health() -> Json<Value> {
    Json(json!({
        "status": "success",
        "message": "Doctor Appointment API is running",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

fn admin_routes(state: Arc<AppConfig>) -> Router {
    auth_routes(state.clone())
        .nest("/appointments", appointment_admin_routes(state.clone()))
        .nest("/doctors", doctor_admin_routes(state.clone()))
        .nest("/services", service_admin_routes(state.clone()))
        .nest("/blogs", blog_admin_routes(state))
}

fn public_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .nest("/services", service_public_routes(state.clone()))
        .nest("/doctors", doctor_public_routes(state.clone()))
        .nest("/blogs", blog_public_routes(state.clone()))
        .nest("/appointments", appointment_public_routes(state.clone()))
        .nest("/contact", contact_public_routes(state))
}

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/v1/admin", admin_routes(state.clone()))
        .nest("/v1", public_routes(state))
}
