use chrono::{Duration, NaiveDate, NaiveTime};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{ListQuery, SupabaseClient};
use shared_utils::validation::Validator;

use crate::models::{
    AppointmentError, AppointmentStatus, AvailableSlotsQuery, AvailableSlotsResponse, TimeSlot,
};
use crate::services::booking::{find_active_doctor, parse_doctor_id};

pub const DAY_START: (u32, u32) = (9, 0);
pub const DAY_END: (u32, u32) = (17, 0);
pub const SLOT_MINUTES: i64 = 30;

/// Candidate start times from 09:00 up to, not including, 17:00.
pub fn slot_grid() -> Vec<NaiveTime> {
    let (Some(mut time), Some(end)) = (
        NaiveTime::from_hms_opt(DAY_START.0, DAY_START.1, 0),
        NaiveTime::from_hms_opt(DAY_END.0, DAY_END.1, 0),
    ) else {
        return Vec::new();
    };

    let mut grid = Vec::new();
    while time < end {
        grid.push(time);
        time += Duration::minutes(SLOT_MINUTES);
    }
    grid
}

/// Marks each grid slot as taken when an active appointment starts at that time.
pub fn build_slots(booked: &[NaiveTime]) -> Vec<TimeSlot> {
    slot_grid()
        .into_iter()
        .map(|time| TimeSlot {
            time: time.format("%H:%M").to_string(),
            available: !booked.contains(&time),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct BookedTime {
    preferred_time: Option<NaiveTime>,
}

pub struct SlotService {
    supabase: SupabaseClient,
}

impl SlotService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn available_slots(
        &self,
        query: AvailableSlotsQuery,
        today: NaiveDate,
    ) -> Result<AvailableSlotsResponse, AppointmentError> {
        let mut v = Validator::new();
        let doctor_id = parse_doctor_id(&mut v, query.doctor_id.as_deref());
        let date = v.required("date", query.date.as_deref(), "The date field is required.")
            .and_then(|_| v.date("date", query.date.as_deref(), "The date is not a valid date."));
        if let Some(date) = date {
            v.check(date > today, "date", "The date must be a date after today.");
        }
        let errors = v.into_errors();
        let (doctor_id, date) = match (doctor_id, date) {
            (Some(doctor_id), Some(date)) if errors.is_empty() => (doctor_id, date),
            _ => return Err(AppointmentError::Validation(errors)),
        };

        debug!("Computing slots for doctor {} on {}", doctor_id, date);

        let doctor = find_active_doctor(&self.supabase, doctor_id).await?;
        let booked = self.booked_times(doctor_id, date).await?;

        Ok(AvailableSlotsResponse {
            date: date.format("%Y-%m-%d").to_string(),
            doctor,
            slots: build_slots(&booked),
        })
    }

    async fn booked_times(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<NaiveTime>, AppointmentError> {
        let path = ListQuery::table("appointments")
            .select("preferred_time")
            .eq("doctor_id", doctor_id)
            .eq("preferred_date", date)
            .in_list("status", &AppointmentStatus::ACTIVE)
            .to_path();

        let rows: Vec<BookedTime> = self.supabase.select(&path).await?;
        Ok(rows.into_iter().filter_map(|row| row.preferred_time).collect())
    }
}
