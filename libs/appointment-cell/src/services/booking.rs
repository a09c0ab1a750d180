use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DatabaseError, ListQuery, SortDirection, SupabaseClient};
use shared_utils::validation::Validator;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, BookableDoctor,
    CheckStatusRequest, APPOINTMENT_SELECT,
};

pub(crate) fn parse_doctor_id(v: &mut Validator, raw: Option<&str>) -> Option<Uuid> {
    let raw = v.required("doctor_id", raw, "The doctor id field is required.")?;
    match Uuid::parse_str(raw) {
        Ok(id) => Some(id),
        Err(_) => {
            v.add("doctor_id", "The selected doctor id is invalid.");
            None
        }
    }
}

/// Blank means "not given"; anything else must be a UUID.
pub(crate) fn parse_optional_id(v: &mut Validator, field: &str, raw: Option<&str>, message: &str) -> Option<Uuid> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty())?;
    match Uuid::parse_str(raw) {
        Ok(id) => Some(id),
        Err(_) => {
            v.add(field, message);
            None
        }
    }
}

pub(crate) async fn find_active_doctor(
    client: &SupabaseClient,
    doctor_id: Uuid,
) -> Result<BookableDoctor, AppointmentError> {
    let path = ListQuery::table("users")
        .select("id,name,specialization")
        .eq("id", doctor_id)
        .eq("role", "doctor")
        .eq("is_active", true)
        .limit(1)
        .to_path();

    client
        .select_one(&path)
        .await?
        .ok_or(AppointmentError::DoctorUnavailable)
}

pub(crate) async fn ensure_active_service(
    client: &SupabaseClient,
    service_id: Uuid,
) -> Result<(), AppointmentError> {
    let path = ListQuery::table("services")
        .select("id")
        .eq("id", service_id)
        .eq("is_active", true)
        .limit(1)
        .to_path();

    let found: Option<Value> = client.select_one(&path).await?;
    found.map(|_| ()).ok_or(AppointmentError::ServiceUnavailable)
}

/// True when an active appointment other than `exclude` holds the doctor/date/time triple.
pub(crate) async fn slot_taken(
    client: &SupabaseClient,
    doctor_id: Uuid,
    date: NaiveDate,
    time: NaiveTime,
    exclude: Option<Uuid>,
) -> Result<bool, AppointmentError> {
    let mut query = ListQuery::table("appointments")
        .eq("doctor_id", doctor_id)
        .eq("preferred_date", date)
        .eq("preferred_time", time.format("%H:%M:%S"))
        .in_list("status", &AppointmentStatus::ACTIVE);
    if let Some(id) = exclude {
        query = query.neq("id", id);
    }

    let taken = client.count(&query.to_path()).await? > 0;
    Ok(taken)
}

/// A unique-index rejection on an appointment write means the slot was taken concurrently.
pub(crate) fn slot_race(err: DatabaseError) -> AppointmentError {
    match err {
        DatabaseError::UniqueViolation(_) => AppointmentError::SlotTaken,
        other => AppointmentError::Database(other),
    }
}

pub struct BookingService {
    supabase: SupabaseClient,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Admits a public booking as `pending`, or rejects it when the slot is held.
    pub async fn book(
        &self,
        request: BookAppointmentRequest,
        today: NaiveDate,
    ) -> Result<Appointment, AppointmentError> {
        let mut v = Validator::new();

        let name = v.required("patient_name", request.patient_name.as_deref(), "The patient name field is required.");
        v.max_length("patient_name", name, 255, "The patient name must not be greater than 255 characters.");

        let email = v.required("patient_email", request.patient_email.as_deref(), "The patient email field is required.");
        v.email("patient_email", email, "The patient email must be a valid email address.");
        v.max_length("patient_email", email, 255, "The patient email must not be greater than 255 characters.");

        let phone = v.required("patient_phone", request.patient_phone.as_deref(), "The patient phone field is required.");
        v.max_length("patient_phone", phone, 20, "The patient phone must not be greater than 20 characters.");

        let doctor_id = parse_doctor_id(&mut v, request.doctor_id.as_deref());
        let service_id = parse_optional_id(
            &mut v,
            "service_id",
            request.service_id.as_deref(),
            "The selected service id is invalid.",
        );

        let date = match v.required("appointment_date", request.appointment_date.as_deref(), "The appointment date field is required.") {
            Some(raw) => v.date("appointment_date", Some(raw), "The appointment date is not a valid date."),
            None => None,
        };
        if let Some(date) = date {
            v.check(date > today, "appointment_date", "The appointment date must be a date after today.");
        }

        let time = match v.required("appointment_time", request.appointment_time.as_deref(), "The appointment time field is required.") {
            Some(raw) => v.time("appointment_time", Some(raw), "The appointment time does not match the format H:i."),
            None => None,
        };

        let notes = request.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());
        v.max_length("notes", notes, 1000, "The notes must not be greater than 1000 characters.");

        let errors = v.into_errors();
        let (name, email, phone, doctor_id, date, time) = match (name, email, phone, doctor_id, date, time) {
            (Some(n), Some(e), Some(p), Some(d), Some(dt), Some(t)) if errors.is_empty() => (n, e, p, d, dt, t),
            _ => return Err(AppointmentError::Validation(errors)),
        };

        debug!("Booking request for doctor {} on {} at {}", doctor_id, date, time);

        find_active_doctor(&self.supabase, doctor_id).await?;
        if let Some(service_id) = service_id {
            ensure_active_service(&self.supabase, service_id).await?;
        }

        if slot_taken(&self.supabase, doctor_id, date, time, None).await? {
            warn!("Slot {} {} already held for doctor {}", date, time, doctor_id);
            return Err(AppointmentError::SlotTaken);
        }

        let path = ListQuery::table("appointments").select(APPOINTMENT_SELECT).to_path();
        let appointment: Appointment = self
            .supabase
            .insert(
                &path,
                json!({
                    "doctor_id": doctor_id,
                    "service_id": service_id,
                    "patient_name": name,
                    "patient_email": email,
                    "patient_phone": phone,
                    "message": notes,
                    "preferred_date": date,
                    "preferred_time": time.format("%H:%M:%S").to_string(),
                    "status": AppointmentStatus::Pending,
                }),
            )
            .await
            .map_err(slot_race)?;

        info!("Appointment {} booked for doctor {}", appointment.id, doctor_id);
        Ok(appointment)
    }

    /// Every appointment matching the patient's email and phone, newest first.
    pub async fn check_status(
        &self,
        request: CheckStatusRequest,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut v = Validator::new();
        let email = v.required("patient_email", request.patient_email.as_deref(), "The patient email field is required.");
        v.email("patient_email", email, "The patient email must be a valid email address.");
        let phone = v.required("patient_phone", request.patient_phone.as_deref(), "The patient phone field is required.");

        let errors = v.into_errors();
        let (email, phone) = match (email, phone) {
            (Some(e), Some(p)) if errors.is_empty() => (e, p),
            _ => return Err(AppointmentError::Validation(errors)),
        };

        let path = ListQuery::table("appointments")
            .select(APPOINTMENT_SELECT)
            .eq("patient_email", email)
            .eq("patient_phone", phone)
            .order("preferred_date", SortDirection::Desc)
            .order("preferred_time", SortDirection::Desc)
            .to_path();

        let appointments: Vec<Appointment> = self.supabase.select(&path).await?;
        if appointments.is_empty() {
            return Err(AppointmentError::NoneFound);
        }
        Ok(appointments)
    }
}
