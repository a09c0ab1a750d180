use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_models::response::{created, message_only, success};

use crate::models::{
    CreateServiceRequest, PublicServiceQuery, ReorderRequest, ServiceListQuery, ServiceResource,
    UpdateServiceRequest,
};
use crate::services::{ServiceCatalogService, ServiceService};

// ==============================================================================
// ADMIN HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_services(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<ServiceListQuery>,
) -> Result<Json<Value>, AppError> {
    let page = ServiceService::new(&state).list(query).await?;
    Ok(success(
        page.map(ServiceResource::from).into_json("services"),
        "Services retrieved successfully",
    ))
}

#[axum::debug_handler]
pub async fn create_service(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = ServiceService::new(&state).create(request).await?;
    Ok(created(ServiceResource::from(service), "Service created successfully"))
}

#[axum::debug_handler]
pub async fn get_service(
    State(state): State<Arc<AppConfig>>,
    Path(service_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = ServiceService::new(&state).get(service_id).await?;
    Ok(success(ServiceResource::from(service), "Service retrieved successfully"))
}

#[axum::debug_handler]
pub async fn update_service(
    State(state): State<Arc<AppConfig>>,
    Path(service_id): Path<Uuid>,
    Json(request): Json<UpdateServiceRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ServiceService::new(&state).update(service_id, request).await?;
    Ok(success(ServiceResource::from(service), "Service updated successfully"))
}

#[axum::debug_handler]
pub async fn delete_service(
    State(state): State<Arc<AppConfig>>,
    Path(service_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ServiceService::new(&state).delete(service_id).await?;
    Ok(message_only("Service deleted successfully"))
}

#[axum::debug_handler]
pub async fn activate_service(
    State(state): State<Arc<AppConfig>>,
    Path(service_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = ServiceService::new(&state).set_active(service_id, true).await?;
    Ok(success(ServiceResource::from(service), "Service activated successfully"))
}

#[axum::debug_handler]
pub async fn deactivate_service(
    State(state): State<Arc<AppConfig>>,
    Path(service_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = ServiceService::new(&state).set_active(service_id, false).await?;
    Ok(success(ServiceResource::from(service), "Service deactivated successfully"))
}

#[axum::debug_handler]
pub async fn reorder_services(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<ReorderRequest>,
) -> Result<Json<Value>, AppError> {
    ServiceService::new(&state).reorder(request).await?;
    Ok(message_only("Services reordered successfully"))
}

#[axum::debug_handler]
pub async fn service_statistics(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let stats = ServiceService::new(&state).statistics().await?;
    Ok(success(stats, "Statistics retrieved successfully"))
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn public_services(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<PublicServiceQuery>,
) -> Result<Json<Value>, AppError> {
    let page = ServiceCatalogService::new(&state).list(query).await?;
    Ok(success(
        page.map(ServiceResource::from).into_json("services"),
        "Services retrieved successfully",
    ))
}

#[axum::debug_handler]
pub async fn featured_services(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let services = ServiceCatalogService::new(&state).featured().await?;
    let resources: Vec<ServiceResource> = services.into_iter().map(ServiceResource::from).collect();
    Ok(success(resources, "Featured services retrieved successfully"))
}

#[axum::debug_handler]
pub async fn public_service(
    State(state): State<Arc<AppConfig>>,
    Path(slug): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = ServiceCatalogService::new(&state).show(&slug).await?;
    Ok(success(ServiceResource::from(service), "Service retrieved successfully"))
}
