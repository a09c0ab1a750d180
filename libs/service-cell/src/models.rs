use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::{AppError, ValidationErrors};
use shared_models::response::{format_amount, format_timestamp};

pub const SERVICE_COLUMNS: &str = "id,name,slug,description,short_description,price,duration,\
icon,image,is_active,display_order,created_at,updated_at";

pub const SERVICE_WITH_COUNT: &str = "id,name,slug,description,short_description,price,duration,\
icon,image,is_active,display_order,created_at,updated_at,appointments(count)";

// ==============================================================================
// CORE SERVICE MODELS
// ==============================================================================

/// PostgREST renders an embedded `appointments(count)` as `[{"count": n}]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedCount {
    pub count: u64,
}

/// Result of the guarded delete function; the function returns null when no service matched.
#[derive(Debug, Clone, Deserialize)]
pub struct GuardedDelete {
    pub deleted: bool,
    pub appointments: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub short_description: Option<String>,
    pub price: f64,
    pub duration: i32,
    pub icon: Option<String>,
    pub image: Option<String>,
    pub is_active: bool,
    pub display_order: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub appointments: Option<Vec<EmbeddedCount>>,
}

impl Service {
    pub fn appointments_count(&self) -> Option<u64> {
        self.appointments
            .as_ref()
            .and_then(|rows| rows.first())
            .map(|c| c.count)
    }
}

fn plural(n: i32, unit: &str) -> String {
    if n == 1 {
        format!("{} {}", n, unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

/// `45` → "45 mins", `60` → "1 hour", `90` → "1 hour 30 mins".
pub fn format_duration(minutes: i32) -> String {
    if minutes < 60 {
        return plural(minutes, "min");
    }
    let hours = plural(minutes / 60, "hour");
    match minutes % 60 {
        0 => hours,
        rest => format!("{} {}", hours, plural(rest, "min")),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceResource {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub short_description: Option<String>,
    pub price: String,
    pub price_raw: f64,
    pub duration: i32,
    pub duration_formatted: String,
    pub icon: Option<String>,
    pub image: Option<String>,
    pub is_active: bool,
    pub order: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointments_count: Option<u64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<Service> for ServiceResource {
    fn from(s: Service) -> Self {
        let appointments_count = s.appointments_count();
        Self {
            id: s.id,
            name: s.name,
            slug: s.slug,
            description: s.description,
            short_description: s.short_description,
            price: format_amount(s.price),
            price_raw: s.price,
            duration: s.duration,
            duration_formatted: format_duration(s.duration),
            icon: s.icon,
            image: s.image,
            is_active: s.is_active,
            order: s.display_order,
            appointments_count,
            created_at: format_timestamp(s.created_at),
            updated_at: format_timestamp(s.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PopularService {
    pub id: Uuid,
    pub name: String,
    pub appointments_count: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServiceStatistics {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    pub total_appointments: u64,
    pub average_price: f64,
    pub average_duration: f64,
    pub most_popular: Vec<PopularService>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateServiceRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub price: Option<f64>,
    pub duration: Option<i32>,
    pub icon: Option<String>,
    pub image: Option<String>,
    pub is_active: Option<bool>,
    pub order: Option<i32>,
}

/// Partial update. Absent fields are untouched; an empty string clears a nullable column.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateServiceRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub price: Option<f64>,
    pub duration: Option<i32>,
    pub icon: Option<String>,
    pub image: Option<String>,
    pub is_active: Option<bool>,
    pub order: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReorderItem {
    pub id: Uuid,
    pub order: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReorderRequest {
    pub services: Option<Vec<ReorderItem>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub is_active: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub min_duration: Option<String>,
    pub max_duration: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublicServiceQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub min_duration: Option<String>,
    pub max_duration: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Service not found")]
    NotFound,

    #[error("A service with this name already exists")]
    NameTaken,

    #[error("This slug is already in use")]
    SlugTaken,

    #[error("Cannot delete service. It has {0} associated appointment(s). Please deactivate instead.")]
    HasAppointments(u64),

    #[error("Service is already active")]
    AlreadyActive,

    #[error("Service is already inactive")]
    AlreadyInactive,

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound => AppError::NotFound(err.to_string()),
            ServiceError::NameTaken | ServiceError::SlugTaken => AppError::Conflict(err.to_string()),
            ServiceError::HasAppointments(_)
            | ServiceError::AlreadyActive
            | ServiceError::AlreadyInactive => AppError::BadRequest(err.to_string()),
            ServiceError::Validation(errors) => AppError::Validation(errors),
            ServiceError::Database(e) => e.into(),
        }
    }
}
