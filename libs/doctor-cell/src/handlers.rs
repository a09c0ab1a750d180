use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_models::response::{created, message_only, success};

use crate::models::{
    CreateDoctorRequest, DoctorListQuery, DoctorResource, PublicDoctorQuery, UpdateDoctorRequest,
};
use crate::services::{DoctorDirectoryService, DoctorService};

// ==============================================================================
// ADMIN HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<DoctorListQuery>,
) -> Result<Json<Value>, AppError> {
    let page = DoctorService::new(&state).list(query).await?;
    Ok(success(
        page.map(DoctorResource::from).into_json("doctors"),
        "Doctors retrieved successfully",
    ))
}

#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let doctor = DoctorService::new(&state).create(request).await?;
    Ok(created(DoctorResource::from(doctor), "Doctor created successfully"))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorService::new(&state).get(doctor_id).await?;
    Ok(success(DoctorResource::from(doctor), "Doctor retrieved successfully"))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorService::new(&state).update(doctor_id, request).await?;
    Ok(success(DoctorResource::from(doctor), "Doctor updated successfully"))
}

#[axum::debug_handler]
pub async fn delete_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    DoctorService::new(&state).delete(doctor_id).await?;
    Ok(message_only("Doctor deleted successfully"))
}

#[axum::debug_handler]
pub async fn activate_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorService::new(&state).set_active(doctor_id, true).await?;
    Ok(success(DoctorResource::from(doctor), "Doctor activated successfully"))
}

#[axum::debug_handler]
pub async fn deactivate_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorService::new(&state).set_active(doctor_id, false).await?;
    Ok(success(DoctorResource::from(doctor), "Doctor deactivated successfully"))
}

#[axum::debug_handler]
pub async fn doctor_statistics(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let stats = DoctorService::new(&state).statistics().await?;
    Ok(success(stats, "Statistics retrieved successfully"))
}

#[axum::debug_handler]
pub async fn admin_specializations(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let specializations = DoctorService::new(&state).specializations().await?;
    Ok(success(
        json!({ "specializations": specializations }),
        "Specializations retrieved successfully",
    ))
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn public_doctors(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<PublicDoctorQuery>,
) -> Result<Json<Value>, AppError> {
    let page = DoctorDirectoryService::new(&state).list(query).await?;
    Ok(success(
        page.map(DoctorResource::from).into_json("doctors"),
        "Doctors retrieved successfully",
    ))
}

#[axum::debug_handler]
pub async fn featured_doctors(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let doctors = DoctorDirectoryService::new(&state).featured().await?;
    let resources: Vec<DoctorResource> = doctors.into_iter().map(DoctorResource::from).collect();
    Ok(success(resources, "Featured doctors retrieved successfully"))
}

#[axum::debug_handler]
pub async fn public_specializations(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let specializations = DoctorDirectoryService::new(&state).specializations().await?;
    Ok(success(specializations, "Specializations retrieved successfully"))
}

#[axum::debug_handler]
pub async fn public_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorDirectoryService::new(&state).show(doctor_id).await?;
    Ok(success(DoctorResource::from(doctor), "Doctor retrieved successfully"))
}
