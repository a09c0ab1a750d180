use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_models::response::{created, message_only, success};

use crate::models::{
    AppointmentListQuery, AppointmentResource, AvailableSlotsQuery, BookAppointmentRequest,
    CheckStatusRequest, CreateAppointmentRequest, LifecycleAction, LifecycleRequest,
    UpdateAppointmentRequest,
};
use crate::services::{AppointmentLifecycleService, AppointmentService, BookingService, SlotService};

// ==============================================================================
// ADMIN HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    let page = AppointmentService::new(&state).list(query).await?;
    Ok(success(
        page.map(AppointmentResource::from).into_json("appointments"),
        "Appointments retrieved successfully",
    ))
}

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let today = Utc::now().date_naive();
    let appointment = AppointmentService::new(&state).create(request, today).await?;
    Ok(created(
        AppointmentResource::from(appointment),
        "Appointment created successfully",
    ))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = AppointmentService::new(&state).get(appointment_id).await?;
    Ok(success(
        AppointmentResource::from(appointment),
        "Appointment retrieved successfully",
    ))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let today = Utc::now().date_naive();
    let appointment = AppointmentService::new(&state)
        .update(appointment_id, request, today)
        .await?;
    Ok(success(
        AppointmentResource::from(appointment),
        "Appointment updated successfully",
    ))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    AppointmentService::new(&state).delete(appointment_id).await?;
    Ok(message_only("Appointment deleted successfully"))
}

async fn run_lifecycle(
    state: &AppConfig,
    appointment_id: Uuid,
    action: LifecycleAction,
    body: Option<Json<LifecycleRequest>>,
) -> Result<Json<Value>, AppError> {
    let admin_notes = body.and_then(|Json(req)| req.admin_notes);
    let appointment = AppointmentLifecycleService::new(state)
        .apply(appointment_id, action, admin_notes)
        .await?;
    Ok(success(
        AppointmentResource::from(appointment),
        action.success_message(),
    ))
}

#[axum::debug_handler]
pub async fn approve_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    body: Option<Json<LifecycleRequest>>,
) -> Result<Json<Value>, AppError> {
    run_lifecycle(&state, appointment_id, LifecycleAction::Approve, body).await
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    body: Option<Json<LifecycleRequest>>,
) -> Result<Json<Value>, AppError> {
    run_lifecycle(&state, appointment_id, LifecycleAction::Cancel, body).await
}

#[axum::debug_handler]
pub async fn reject_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    body: Option<Json<LifecycleRequest>>,
) -> Result<Json<Value>, AppError> {
    run_lifecycle(&state, appointment_id, LifecycleAction::Reject, body).await
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    body: Option<Json<LifecycleRequest>>,
) -> Result<Json<Value>, AppError> {
    run_lifecycle(&state, appointment_id, LifecycleAction::Complete, body).await
}

#[axum::debug_handler]
pub async fn appointment_statistics(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let today = Utc::now().date_naive();
    let stats = AppointmentService::new(&state).statistics(today).await?;
    Ok(success(stats, "Statistics retrieved successfully"))
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let today = Utc::now().date_naive();
    let appointment = BookingService::new(&state).book(request, today).await?;
    Ok(created(
        AppointmentResource::from(appointment),
        "Appointment booked successfully. You will receive a confirmation email shortly.",
    ))
}

#[axum::debug_handler]
pub async fn available_slots(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    debug!("Available slots requested: {:?}", query);
    let today = Utc::now().date_naive();
    let slots = SlotService::new(&state).available_slots(query, today).await?;
    Ok(success(slots, "Available slots retrieved successfully"))
}

#[axum::debug_handler]
pub async fn check_status(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<CheckStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let appointments = BookingService::new(&state).check_status(request).await?;
    let resources: Vec<AppointmentResource> =
        appointments.into_iter().map(AppointmentResource::from).collect();
    Ok(success(resources, "Appointments retrieved successfully"))
}
