use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::{AppError, ValidationErrors};
use shared_models::response::format_timestamp;

/// PostgREST `select` for an appointment with its doctor and service embedded.
pub const APPOINTMENT_SELECT: &str =
    "*,doctor:doctor_id(id,name,specialization,email,phone),service:service_id(id,name,price,duration)";

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Rejected,
}

impl AppointmentStatus {
    /// Statuses that hold a doctor's slot.
    pub const ACTIVE: [AppointmentStatus; 2] = [AppointmentStatus::Pending, AppointmentStatus::Confirmed];

    pub const ALL: [AppointmentStatus; 5] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Rejected,
    ];

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.to_string() == raw)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Admin actions that move an appointment through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Approve,
    Cancel,
    Reject,
    Complete,
}

impl LifecycleAction {
    /// The action that lands an appointment in `status`; `pending` has none.
    pub fn for_target(status: AppointmentStatus) -> Option<Self> {
        match status {
            AppointmentStatus::Pending => None,
            AppointmentStatus::Confirmed => Some(LifecycleAction::Approve),
            AppointmentStatus::Cancelled => Some(LifecycleAction::Cancel),
            AppointmentStatus::Rejected => Some(LifecycleAction::Reject),
            AppointmentStatus::Completed => Some(LifecycleAction::Complete),
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            LifecycleAction::Approve => "Appointment approved successfully",
            LifecycleAction::Cancel => "Appointment cancelled successfully",
            LifecycleAction::Reject => "Appointment rejected successfully",
            LifecycleAction::Complete => "Appointment marked as completed",
        }
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleAction::Approve => write!(f, "approve"),
            LifecycleAction::Cancel => write!(f, "cancel"),
            LifecycleAction::Reject => write!(f, "reject"),
            LifecycleAction::Complete => write!(f, "complete"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSummary {
    pub id: Uuid,
    pub name: String,
    pub specialization: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSummary {
    pub id: Uuid,
    pub name: String,
    pub price: Option<f64>,
    pub duration: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub patient_name: String,
    pub patient_email: Option<String>,
    pub patient_phone: String,
    pub message: Option<String>,
    pub preferred_date: NaiveDate,
    pub preferred_time: Option<NaiveTime>,
    pub status: AppointmentStatus,
    pub admin_notes: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub doctor: Option<DoctorSummary>,
    #[serde(default)]
    pub service: Option<ServiceSummary>,
}

/// Outward view of an appointment.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentResource {
    pub id: Uuid,
    pub doctor: DoctorView,
    pub service: ServiceView,
    pub patient_name: String,
    pub patient_email: Option<String>,
    pub patient_phone: String,
    pub message: Option<String>,
    pub preferred_date: String,
    pub preferred_time: Option<String>,
    pub status: AppointmentStatus,
    pub admin_notes: Option<String>,
    pub confirmed_at: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DoctorView {
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub specialization: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ServiceView {
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub duration: Option<i32>,
}

impl From<Appointment> for AppointmentResource {
    fn from(a: Appointment) -> Self {
        let doctor = a
            .doctor
            .map(|d| DoctorView {
                id: Some(d.id),
                name: Some(d.name),
                specialization: d.specialization,
                email: d.email,
                phone: d.phone,
            })
            .unwrap_or_default();
        let service = a
            .service
            .map(|s| ServiceView {
                id: Some(s.id),
                name: Some(s.name),
                price: s.price,
                duration: s.duration,
            })
            .unwrap_or_default();

        Self {
            id: a.id,
            doctor,
            service,
            patient_name: a.patient_name,
            patient_email: a.patient_email,
            patient_phone: a.patient_phone,
            message: a.message,
            preferred_date: a.preferred_date.format("%Y-%m-%d").to_string(),
            preferred_time: a.preferred_time.map(|t| t.format("%H:%M:%S").to_string()),
            status: a.status,
            admin_notes: a.admin_notes,
            confirmed_at: format_timestamp(a.confirmed_at),
            created_at: format_timestamp(a.created_at),
            updated_at: format_timestamp(a.updated_at),
        }
    }
}

/// Bookable doctor as seen by the slot calculator and booking guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookableDoctor {
    pub id: Uuid,
    pub name: String,
    pub specialization: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TimeSlot {
    pub time: String,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailableSlotsResponse {
    pub date: String,
    pub doctor: BookableDoctor,
    pub slots: Vec<TimeSlot>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AppointmentStatistics {
    pub total: u64,
    pub pending: u64,
    pub confirmed: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub rejected: u64,
    pub today: u64,
    pub this_week: u64,
    pub this_month: u64,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// Public booking form. Fields stay loosely typed so every problem is reported per field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_name: Option<String>,
    pub patient_email: Option<String>,
    pub patient_phone: Option<String>,
    pub doctor_id: Option<String>,
    pub service_id: Option<String>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvailableSlotsQuery {
    pub doctor_id: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckStatusRequest {
    pub patient_email: Option<String>,
    pub patient_phone: Option<String>,
}

/// Admin create form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateAppointmentRequest {
    pub doctor_id: Option<String>,
    pub service_id: Option<String>,
    #[serde(alias = "name")]
    pub patient_name: Option<String>,
    pub patient_email: Option<String>,
    #[serde(alias = "phone")]
    pub patient_phone: Option<String>,
    pub message: Option<String>,
    pub preferred_date: Option<String>,
    pub preferred_time: Option<String>,
    pub status: Option<String>,
    pub admin_notes: Option<String>,
}

/// Admin partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub doctor_id: Option<String>,
    pub service_id: Option<String>,
    #[serde(alias = "name")]
    pub patient_name: Option<String>,
    pub patient_email: Option<String>,
    #[serde(alias = "phone")]
    pub patient_phone: Option<String>,
    pub message: Option<String>,
    pub preferred_date: Option<String>,
    pub preferred_time: Option<String>,
    pub status: Option<String>,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LifecycleRequest {
    pub admin_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<String>,
    pub doctor_id: Option<String>,
    pub service_id: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found or inactive")]
    DoctorUnavailable,

    #[error("Service not found or inactive")]
    ServiceUnavailable,

    #[error("This time slot is already booked. Please choose another time.")]
    SlotTaken,

    #[error("{0}")]
    InvalidTransition(String),

    #[error("Appointment was modified by another request. Please reload and try again.")]
    ConcurrentModification,

    #[error("No appointments found with the provided information")]
    NoneFound,

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound
            | AppointmentError::DoctorUnavailable
            | AppointmentError::ServiceUnavailable
            | AppointmentError::NoneFound => AppError::NotFound(err.to_string()),
            AppointmentError::SlotTaken | AppointmentError::ConcurrentModification => {
                AppError::Conflict(err.to_string())
            }
            AppointmentError::InvalidTransition(msg) => AppError::State(msg),
            AppointmentError::Validation(errors) => AppError::Validation(errors),
            AppointmentError::Database(DatabaseError::UniqueViolation(_)) => {
                AppError::Conflict(AppointmentError::SlotTaken.to_string())
            }
            AppointmentError::Database(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(status: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "doctor_id": null,
            "service_id": null,
            "patient_name": "Jane",
            "patient_email": null,
            "patient_phone": "555",
            "message": null,
            "preferred_date": "2025-06-10",
            "preferred_time": "10:00:00",
            "status": status,
            "admin_notes": null,
            "confirmed_at": null,
            "created_at": "2025-06-01T08:00:00Z",
            "updated_at": "2025-06-01T08:00:00Z"
        })
    }

    #[test]
    fn status_round_trip_and_activity() {
        assert_eq!(AppointmentStatus::parse("rejected"), Some(AppointmentStatus::Rejected));
        assert_eq!(AppointmentStatus::parse("approved"), None);
        assert!(AppointmentStatus::Pending.is_active());
        assert!(AppointmentStatus::Confirmed.is_active());
        assert!(!AppointmentStatus::Completed.is_active());
    }

    #[test]
    fn resource_without_relations_keeps_empty_objects() {
        let appointment: Appointment = serde_json::from_value(row("pending")).unwrap();
        let resource = serde_json::to_value(AppointmentResource::from(appointment)).unwrap();

        assert!(resource["doctor"]["id"].is_null());
        assert!(resource["service"]["name"].is_null());
        assert_eq!(resource["preferred_time"], "10:00:00");
        assert_eq!(resource["created_at"], "2025-06-01 08:00:00");
        assert_eq!(resource["status"], "pending");
    }

    #[test]
    fn errors_map_to_http_kinds() {
        let conflict: AppError = AppointmentError::SlotTaken.into();
        assert_eq!(conflict.status_code().as_u16(), 409);

        let state: AppError = AppointmentError::InvalidTransition("nope".into()).into();
        assert_eq!(state.status_code().as_u16(), 400);

        let raced: AppError = AppointmentError::Database(DatabaseError::UniqueViolation("idx".into())).into();
        assert_eq!(raced.public_message(), "This time slot is already booked. Please choose another time.");

        let missing: AppError = AppointmentError::DoctorUnavailable.into();
        assert_eq!(missing.public_message(), "Doctor not found or inactive");
    }

    #[test]
    fn only_pending_has_no_action() {
        assert_eq!(LifecycleAction::for_target(AppointmentStatus::Pending), None);
        assert_eq!(
            LifecycleAction::for_target(AppointmentStatus::Completed),
            Some(LifecycleAction::Complete)
        );
    }
}
