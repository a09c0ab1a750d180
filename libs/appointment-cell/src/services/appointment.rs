use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde_json::{json, Map};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{ListQuery, Page, PageRequest, SortDirection, SortSpec, SupabaseClient};
use shared_utils::validation::{parse_stored_time, present, Validator};

use crate::models::{
    Appointment, AppointmentError, AppointmentListQuery, AppointmentStatistics, AppointmentStatus,
    CreateAppointmentRequest, LifecycleAction, UpdateAppointmentRequest, APPOINTMENT_SELECT,
};
use crate::services::booking::{parse_optional_id, slot_race, slot_taken};
use crate::services::lifecycle::{guarded_update, plan_transition};

pub const ADMIN_PER_PAGE: u32 = 15;
const SORTABLE: [&str; 5] = ["created_at", "preferred_date", "preferred_time", "status", "patient_name"];
const SEARCHABLE: [&str; 2] = ["patient_name", "patient_phone"];

pub(crate) async fn find_appointment(
    client: &SupabaseClient,
    appointment_id: Uuid,
) -> Result<Appointment, AppointmentError> {
    let path = ListQuery::table("appointments")
        .select(APPOINTMENT_SELECT)
        .eq("id", appointment_id)
        .limit(1)
        .to_path();

    client
        .select_one(&path)
        .await?
        .ok_or(AppointmentError::NotFound)
}

/// Admin form times may carry seconds.
fn admin_time(v: &mut Validator, raw: Option<&str>) -> Option<NaiveTime> {
    let raw = present(raw)?;
    let parsed = parse_stored_time(raw);
    if parsed.is_none() {
        v.add("preferred_time", "The preferred time does not match the format H:i:s.");
    }
    parsed
}

fn admin_status(v: &mut Validator, raw: Option<&str>) -> Option<AppointmentStatus> {
    let raw = present(raw)?;
    let parsed = AppointmentStatus::parse(raw);
    if parsed.is_none() {
        v.add("status", "Invalid appointment status.");
    }
    parsed
}

async fn ensure_doctor_exists(client: &SupabaseClient, v: &mut Validator, doctor_id: Uuid) -> Result<(), AppointmentError> {
    let path = ListQuery::table("users")
        .select("id")
        .eq("id", doctor_id)
        .eq("role", "doctor")
        .to_path();
    if client.count(&path).await? == 0 {
        v.add("doctor_id", "The selected doctor does not exist.");
    }
    Ok(())
}

async fn ensure_service_exists(client: &SupabaseClient, v: &mut Validator, service_id: Uuid) -> Result<(), AppointmentError> {
    let path = ListQuery::table("services").select("id").eq("id", service_id).to_path();
    if client.count(&path).await? == 0 {
        v.add("service_id", "The selected service does not exist.");
    }
    Ok(())
}

/// Monday..=Sunday of the week containing `today`.
pub fn week_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    (monday, monday + Duration::days(6))
}

/// First and last calendar day of the month containing `today`.
pub fn month_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = today.with_day(1).unwrap_or(today);
    let next_month = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    let last = next_month.map(|d| d - Duration::days(1)).unwrap_or(today);
    (first, last)
}

pub struct AppointmentService {
    supabase: SupabaseClient,
}

impl AppointmentService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list(&self, query: AppointmentListQuery) -> Result<Page<Appointment>, AppointmentError> {
        debug!("Listing appointments with {:?}", query);

        let mut v = Validator::new();
        let doctor_id = parse_optional_id(&mut v, "doctor_id", query.doctor_id.as_deref(), "The doctor id must be a valid UUID.");
        let service_id = parse_optional_id(&mut v, "service_id", query.service_id.as_deref(), "The service id must be a valid UUID.");
        let date_from = v.date("date_from", query.date_from.as_deref(), "The date from is not a valid date.");
        let date_to = v.date("date_to", query.date_to.as_deref(), "The date to is not a valid date.");
        let errors = v.into_errors();
        if !errors.is_empty() {
            return Err(AppointmentError::Validation(errors));
        }

        let sort = SortSpec::resolve(
            query.sort_by.as_deref(),
            query.sort_order.as_deref(),
            &SORTABLE,
            "created_at",
            SortDirection::Desc,
        );

        let path = ListQuery::table("appointments")
            .select(APPOINTMENT_SELECT)
            .eq_opt("status", query.status.as_deref())
            .eq_opt("doctor_id", doctor_id)
            .eq_opt("service_id", service_id)
            .gte_opt("preferred_date", date_from)
            .lte_opt("preferred_date", date_to)
            .search(&SEARCHABLE, query.search.as_deref())
            .sort(&sort)
            .to_path();

        let page = PageRequest::new(query.page, query.per_page, ADMIN_PER_PAGE);
        Ok(self.supabase.fetch_page(&path, page).await?)
    }

    pub async fn get(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        find_appointment(&self.supabase, appointment_id).await
    }

    pub async fn create(
        &self,
        request: CreateAppointmentRequest,
        today: NaiveDate,
    ) -> Result<Appointment, AppointmentError> {
        let mut v = Validator::new();

        let doctor_id = parse_optional_id(&mut v, "doctor_id", request.doctor_id.as_deref(), "The selected doctor does not exist.");
        let service_id = parse_optional_id(&mut v, "service_id", request.service_id.as_deref(), "The selected service does not exist.");

        let name = v.required("patient_name", request.patient_name.as_deref(), "Patient name is required.");
        v.max_length("patient_name", name, 255, "The patient name must not be greater than 255 characters.");
        let phone = v.required("patient_phone", request.patient_phone.as_deref(), "Patient phone number is required.");
        v.max_length("patient_phone", phone, 20, "The patient phone must not be greater than 20 characters.");
        let email = present(request.patient_email.as_deref());
        v.email("patient_email", email, "The patient email must be a valid email address.");

        let message = present(request.message.as_deref());
        v.max_length("message", message, 1000, "The message must not be greater than 1000 characters.");
        let admin_notes = present(request.admin_notes.as_deref());
        v.max_length("admin_notes", admin_notes, 1000, "The admin notes must not be greater than 1000 characters.");

        let date = match v.required("preferred_date", request.preferred_date.as_deref(), "Preferred appointment date is required.") {
            Some(raw) => v.date("preferred_date", Some(raw), "The preferred date is not a valid date."),
            None => None,
        };
        if let Some(date) = date {
            v.check(date >= today, "preferred_date", "Appointment date must be today or a future date.");
        }
        let time = admin_time(&mut v, request.preferred_time.as_deref());
        let status = admin_status(&mut v, request.status.as_deref()).unwrap_or(AppointmentStatus::Pending);

        if let Some(doctor_id) = doctor_id {
            ensure_doctor_exists(&self.supabase, &mut v, doctor_id).await?;
        }
        if let Some(service_id) = service_id {
            ensure_service_exists(&self.supabase, &mut v, service_id).await?;
        }

        let errors = v.into_errors();
        let (name, phone, date) = match (name, phone, date) {
            (Some(n), Some(p), Some(d)) if errors.is_empty() => (n, p, d),
            _ => return Err(AppointmentError::Validation(errors)),
        };

        if let (Some(doctor_id), Some(time), true) = (doctor_id, time, status.is_active()) {
            if slot_taken(&self.supabase, doctor_id, date, time, None).await? {
                return Err(AppointmentError::SlotTaken);
            }
        }

        // a completed appointment has necessarily been confirmed
        let confirmed_at = matches!(status, AppointmentStatus::Confirmed | AppointmentStatus::Completed)
            .then(Utc::now);

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
                    "message": message,
                    "preferred_date": date,
                    "preferred_time": time.map(|t| t.format("%H:%M:%S").to_string()),
                    "status": status,
                    "admin_notes": admin_notes,
                    "confirmed_at": confirmed_at,
                }),
            )
            .await
            .map_err(slot_race)?;

        info!("Appointment {} created by admin", appointment.id);
        Ok(appointment)
    }

    /// Partial update. A status change goes through the lifecycle rules and is
    /// written in the same guarded statement as the field changes.
    pub async fn update(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        today: NaiveDate,
    ) -> Result<Appointment, AppointmentError> {
        let current = find_appointment(&self.supabase, appointment_id).await?;
        let mut v = Validator::new();
        let mut changes = Map::new();

        let mut doctor_id = current.doctor_id;
        if let Some(raw) = request.doctor_id.as_deref() {
            doctor_id = parse_optional_id(&mut v, "doctor_id", Some(raw), "The selected doctor does not exist.");
            if let Some(id) = doctor_id {
                ensure_doctor_exists(&self.supabase, &mut v, id).await?;
            }
            changes.insert("doctor_id".to_string(), json!(doctor_id));
        }
        if let Some(raw) = request.service_id.as_deref() {
            let service_id = parse_optional_id(&mut v, "service_id", Some(raw), "The selected service does not exist.");
            if let Some(id) = service_id {
                ensure_service_exists(&self.supabase, &mut v, id).await?;
            }
            changes.insert("service_id".to_string(), json!(service_id));
        }

        if request.patient_name.is_some() {
            let name = v.required("patient_name", request.patient_name.as_deref(), "Patient name is required.");
            v.max_length("patient_name", name, 255, "The patient name must not be greater than 255 characters.");
            changes.insert("patient_name".to_string(), json!(name));
        }
        if request.patient_phone.is_some() {
            let phone = v.required("patient_phone", request.patient_phone.as_deref(), "Patient phone number is required.");
            v.max_length("patient_phone", phone, 20, "The patient phone must not be greater than 20 characters.");
            changes.insert("patient_phone".to_string(), json!(phone));
        }
        if let Some(raw) = request.patient_email.as_deref() {
            let email = present(Some(raw));
            v.email("patient_email", email, "The patient email must be a valid email address.");
            changes.insert("patient_email".to_string(), json!(email));
        }
        if let Some(raw) = request.message.as_deref() {
            v.max_length("message", Some(raw), 1000, "The message must not be greater than 1000 characters.");
            changes.insert("message".to_string(), json!(present(Some(raw))));
        }
        if let Some(raw) = request.admin_notes.as_deref() {
            v.max_length("admin_notes", Some(raw), 1000, "The admin notes must not be greater than 1000 characters.");
            changes.insert("admin_notes".to_string(), json!(present(Some(raw))));
        }

        let mut date = current.preferred_date;
        if request.preferred_date.is_some() {
            if let Some(parsed) = v.required("preferred_date", request.preferred_date.as_deref(), "Preferred appointment date is required.")
                .and_then(|raw| v.date("preferred_date", Some(raw), "The preferred date is not a valid date."))
            {
                if parsed != current.preferred_date {
                    v.check(parsed >= today, "preferred_date", "Appointment date must be today or a future date.");
                }
                date = parsed;
                changes.insert("preferred_date".to_string(), json!(parsed));
            }
        }

        let mut time = current.preferred_time;
        if let Some(raw) = request.preferred_time.as_deref() {
            time = admin_time(&mut v, Some(raw));
            changes.insert(
                "preferred_time".to_string(),
                json!(time.map(|t| t.format("%H:%M:%S").to_string())),
            );
        }

        let target = admin_status(&mut v, request.status.as_deref());

        let errors = v.into_errors();
        if !errors.is_empty() {
            return Err(AppointmentError::Validation(errors));
        }

        let mut status = current.status;
        if let Some(target) = target.filter(|t| *t != current.status) {
            let action = LifecycleAction::for_target(target).ok_or_else(|| {
                AppointmentError::InvalidTransition("Appointment status cannot be reset to pending".to_string())
            })?;
            let transition = plan_transition(current.status, current.confirmed_at.is_some(), action)?;
            transition.write_into(&mut changes, Utc::now());
            status = transition.to;
        }

        let slot_moved = doctor_id != current.doctor_id
            || date != current.preferred_date
            || time != current.preferred_time;
        let reactivated = status.is_active() && !current.status.is_active();
        if status.is_active() && (slot_moved || reactivated) {
            if let (Some(doctor_id), Some(time)) = (doctor_id, time) {
                if slot_taken(&self.supabase, doctor_id, date, time, Some(current.id)).await? {
                    warn!("Update of {} would double-book doctor {}", current.id, doctor_id);
                    return Err(AppointmentError::SlotTaken);
                }
            }
        }

        let updated = guarded_update(&self.supabase, &current, changes).await?;
        info!("Appointment {} updated", appointment_id);
        Ok(updated)
    }

    pub async fn delete(&self, appointment_id: Uuid) -> Result<(), AppointmentError> {
        let path = ListQuery::table("appointments").eq("id", appointment_id).to_path();
        let removed = self.supabase.delete(&path).await?;
        if removed == 0 {
            return Err(AppointmentError::NotFound);
        }
        info!("Appointment {} deleted", appointment_id);
        Ok(())
    }

    pub async fn statistics(&self, today: NaiveDate) -> Result<AppointmentStatistics, AppointmentError> {
        let count = |query: ListQuery| {
            let path = query.to_path();
            async move { self.supabase.count(&path).await }
        };
        let by_status = |status: AppointmentStatus| count(ListQuery::table("appointments").eq("status", status));
        let (week_start, week_end) = week_bounds(today);
        let (month_start, month_end) = month_bounds(today);

        let (total, pending, confirmed, completed, cancelled, rejected, today_count, this_week, this_month) =
            futures::try_join!(
                count(ListQuery::table("appointments")),
                by_status(AppointmentStatus::Pending),
                by_status(AppointmentStatus::Confirmed),
                by_status(AppointmentStatus::Completed),
                by_status(AppointmentStatus::Cancelled),
                by_status(AppointmentStatus::Rejected),
                count(ListQuery::table("appointments").eq("preferred_date", today)),
                count(
                    ListQuery::table("appointments")
                        .gte("preferred_date", week_start)
                        .lte("preferred_date", week_end)
                ),
                count(
                    ListQuery::table("appointments")
                        .gte("preferred_date", month_start)
                        .lte("preferred_date", month_end)
                ),
            )?;

        Ok(AppointmentStatistics {
            total,
            pending,
            confirmed,
            completed,
            cancelled,
            rejected,
            today: today_count,
            this_week,
            this_month,
        })
    }
}
