use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::{AppError, ValidationErrors};
use shared_models::response::{format_amount, format_timestamp};

/// Doctor columns of `users`; the password hash is never selected.
pub const DOCTOR_COLUMNS: &str = "id,name,email,phone,address,specialization,bio,license_number,\
years_of_experience,consultation_fee,profile_image,is_active,created_at,updated_at";

/// Same columns plus the embedded appointment count.
pub const DOCTOR_WITH_COUNT: &str = "id,name,email,phone,address,specialization,bio,license_number,\
years_of_experience,consultation_fee,profile_image,is_active,created_at,updated_at,appointments(count)";

// ==============================================================================
// CORE DOCTOR MODELS
// ==============================================================================

/// PostgREST renders an embedded `appointments(count)` as `[{"count": n}]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedCount {
    pub count: u64,
}

/// Result of the guarded delete function; the function returns null when no doctor matched.
#[derive(Debug, Clone, Deserialize)]
pub struct GuardedDelete {
    pub deleted: bool,
    pub appointments: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub specialization: Option<String>,
    pub bio: Option<String>,
    pub license_number: Option<String>,
    pub years_of_experience: Option<i32>,
    pub consultation_fee: Option<f64>,
    pub profile_image: Option<String>,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub appointments: Option<Vec<EmbeddedCount>>,
}

impl Doctor {
    pub fn appointments_count(&self) -> Option<u64> {
        self.appointments
            .as_ref()
            .and_then(|rows| rows.first())
            .map(|c| c.count)
    }
}

/// Seniority band derived from years of experience.
pub fn experience_level(years: Option<i32>) -> &'static str {
    match years {
        None | Some(0) => "Not specified",
        Some(y) if y < 2 => "Junior",
        Some(y) if y < 5 => "Mid-level",
        Some(y) if y < 10 => "Senior",
        Some(y) if y < 20 => "Expert",
        Some(_) => "Master",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorResource {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub specialization: Option<String>,
    pub bio: Option<String>,
    pub license_number: Option<String>,
    pub years_of_experience: Option<i32>,
    pub experience_level: &'static str,
    pub consultation_fee: Option<String>,
    pub consultation_fee_raw: Option<f64>,
    pub profile_image: Option<String>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointments_count: Option<u64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<Doctor> for DoctorResource {
    fn from(d: Doctor) -> Self {
        let appointments_count = d.appointments_count();
        // a zero fee renders as unset
        let fee = d.consultation_fee.filter(|f| *f != 0.0);

        Self {
            id: d.id,
            name: d.name,
            email: d.email,
            phone: d.phone,
            address: d.address,
            specialization: d.specialization,
            bio: d.bio,
            license_number: d.license_number,
            years_of_experience: d.years_of_experience,
            experience_level: experience_level(d.years_of_experience),
            consultation_fee: fee.map(format_amount),
            consultation_fee_raw: fee,
            profile_image: d.profile_image,
            is_active: d.is_active,
            appointments_count,
            created_at: format_timestamp(d.created_at),
            updated_at: format_timestamp(d.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SpecializationCount {
    pub specialization: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MostBookedDoctor {
    pub id: Uuid,
    pub name: String,
    pub specialization: Option<String>,
    pub appointments_count: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DoctorStatistics {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    pub total_appointments: u64,
    pub average_experience: f64,
    pub average_fee: f64,
    pub specializations: Vec<SpecializationCount>,
    pub most_booked: Vec<MostBookedDoctor>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateDoctorRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub specialization: Option<String>,
    pub bio: Option<String>,
    pub license_number: Option<String>,
    pub years_of_experience: Option<i32>,
    pub consultation_fee: Option<f64>,
    pub profile_image: Option<String>,
    pub is_active: Option<bool>,
}

/// Partial update. Absent fields are untouched; an empty string clears a nullable column.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDoctorRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub specialization: Option<String>,
    pub bio: Option<String>,
    pub license_number: Option<String>,
    pub years_of_experience: Option<i32>,
    pub consultation_fee: Option<f64>,
    pub profile_image: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub is_active: Option<String>,
    pub specialization: Option<String>,
    pub search: Option<String>,
    pub min_experience: Option<String>,
    pub max_experience: Option<String>,
    pub min_fee: Option<String>,
    pub max_fee: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublicDoctorQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub specialization: Option<String>,
    pub search: Option<String>,
    pub min_fee: Option<String>,
    pub max_fee: Option<String>,
    pub min_experience: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("This email address is already registered")]
    EmailTaken,

    #[error("This license number is already registered")]
    LicenseTaken,

    #[error("Cannot delete doctor. They have {0} associated appointment(s). Please deactivate instead.")]
    HasAppointments(u64),

    #[error("Doctor is already active")]
    AlreadyActive,

    #[error("Doctor is already inactive")]
    AlreadyInactive,

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    Internal(String),
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound => AppError::NotFound(err.to_string()),
            DoctorError::EmailTaken | DoctorError::LicenseTaken => AppError::Conflict(err.to_string()),
            DoctorError::HasAppointments(_)
            | DoctorError::AlreadyActive
            | DoctorError::AlreadyInactive => AppError::BadRequest(err.to_string()),
            DoctorError::Validation(errors) => AppError::Validation(errors),
            DoctorError::Database(e) => e.into(),
            DoctorError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<AppError> for DoctorError {
    fn from(err: AppError) -> Self {
        DoctorError::Internal(err.to_string())
    }
}
