use std::collections::BTreeMap;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DatabaseError, ListQuery, Page, PageRequest, SortDirection, SortSpec, SupabaseClient};
use shared_utils::password::hash_password;
use shared_utils::validation::{present, Validator};

use crate::models::{
    CreateDoctorRequest, Doctor, DoctorError, DoctorListQuery, DoctorStatistics, EmbeddedCount, GuardedDelete,
    MostBookedDoctor, SpecializationCount, UpdateDoctorRequest, DOCTOR_COLUMNS, DOCTOR_WITH_COUNT,
};

pub const ADMIN_PER_PAGE: u32 = 15;
const SORTABLE: [&str; 5] = ["name", "specialization", "years_of_experience", "consultation_fee", "created_at"];
const SEARCHABLE: [&str; 4] = ["name", "email", "phone", "specialization"];
const MAX_FEE: f64 = 999_999.99;

/// Checks shared by create and update for the optional profile columns.
fn check_profile(
    v: &mut Validator,
    phone: Option<&str>,
    address: Option<&str>,
    license_number: Option<&str>,
    years_of_experience: Option<i32>,
    consultation_fee: Option<f64>,
    profile_image: Option<&str>,
) {
    v.max_length("phone", phone, 20, "Phone number cannot exceed 20 characters");
    v.max_length("address", address, 500, "Address cannot exceed 500 characters");
    v.max_length("license_number", license_number, 100, "License number cannot exceed 100 characters");
    v.max_length("profile_image", profile_image, 255, "Profile image cannot exceed 255 characters");

    if let Some(years) = years_of_experience {
        v.check(years >= 0, "years_of_experience", "Years of experience cannot be negative");
        v.check(years <= 70, "years_of_experience", "Years of experience cannot exceed 70");
    }
    if let Some(fee) = consultation_fee {
        v.check(fee >= 0.0, "consultation_fee", "Consultation fee cannot be negative");
        v.check(fee <= MAX_FEE, "consultation_fee", "Consultation fee cannot exceed 999,999.99");
    }
}

/// A unique-index rejection names the violated constraint; anything mentioning the
/// license column is a duplicate license, the rest are duplicate emails.
fn duplicate(err: DatabaseError) -> DoctorError {
    match err {
        DatabaseError::UniqueViolation(msg) if msg.contains("license") => DoctorError::LicenseTaken,
        DatabaseError::UniqueViolation(_) => DoctorError::EmailTaken,
        other => DoctorError::Database(other),
    }
}

#[derive(Debug, Deserialize)]
struct DoctorStatRow {
    id: Uuid,
    name: String,
    specialization: Option<String>,
    years_of_experience: Option<i32>,
    consultation_fee: Option<f64>,
    is_active: bool,
    appointments: Vec<EmbeddedCount>,
}

impl DoctorStatRow {
    fn appointments_count(&self) -> u64 {
        self.appointments.first().map(|c| c.count).unwrap_or(0)
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0u32), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn summarize(rows: &[DoctorStatRow]) -> DoctorStatistics {
    let active = rows.iter().filter(|r| r.is_active).count() as u64;

    let mut by_specialization: BTreeMap<&str, u64> = BTreeMap::new();
    for spec in rows.iter().filter_map(|r| r.specialization.as_deref()) {
        *by_specialization.entry(spec).or_default() += 1;
    }
    let mut specializations: Vec<SpecializationCount> = by_specialization
        .into_iter()
        .map(|(specialization, count)| SpecializationCount {
            specialization: specialization.to_string(),
            count,
        })
        .collect();
    specializations.sort_by(|a, b| b.count.cmp(&a.count));

    let mut most_booked: Vec<MostBookedDoctor> = rows
        .iter()
        .map(|r| MostBookedDoctor {
            id: r.id,
            name: r.name.clone(),
            specialization: r.specialization.clone(),
            appointments_count: r.appointments_count(),
        })
        .collect();
    most_booked.sort_by(|a, b| b.appointments_count.cmp(&a.appointments_count));
    most_booked.truncate(5);

    DoctorStatistics {
        total: rows.len() as u64,
        active,
        inactive: rows.len() as u64 - active,
        total_appointments: rows.iter().map(DoctorStatRow::appointments_count).sum(),
        average_experience: round_to(
            average(rows.iter().filter_map(|r| r.years_of_experience).map(f64::from)),
            1,
        ),
        average_fee: round_to(average(rows.iter().filter_map(|r| r.consultation_fee)), 2),
        specializations,
        most_booked,
    }
}

/// Distinct, sorted specialization names.
pub(crate) fn distinct_specializations(rows: Vec<SpecializationRow>) -> Vec<String> {
    let mut names: Vec<String> = rows
        .into_iter()
        .filter_map(|r| r.specialization)
        .filter(|s| !s.trim().is_empty())
        .collect();
    names.sort();
    names.dedup();
    names
}

#[derive(Debug, Deserialize)]
pub(crate) struct SpecializationRow {
    pub specialization: Option<String>,
}

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn doctors() -> ListQuery {
        ListQuery::table("users").eq("role", "doctor")
    }

    pub async fn list(&self, query: DoctorListQuery) -> Result<Page<Doctor>, DoctorError> {
        debug!("Listing doctors with {:?}", query);

        let mut v = Validator::new();
        let is_active = v.boolean("is_active", query.is_active.as_deref(), "The is active field must be true or false.");
        let min_experience: Option<i32> = v.number("min_experience", query.min_experience.as_deref(), "The min experience must be a number.");
        let max_experience: Option<i32> = v.number("max_experience", query.max_experience.as_deref(), "The max experience must be a number.");
        let min_fee: Option<f64> = v.number("min_fee", query.min_fee.as_deref(), "The min fee must be a number.");
        let max_fee: Option<f64> = v.number("max_fee", query.max_fee.as_deref(), "The max fee must be a number.");
        let errors = v.into_errors();
        if !errors.is_empty() {
            return Err(DoctorError::Validation(errors));
        }

        let sort = SortSpec::resolve(
            query.sort_by.as_deref(),
            query.sort_order.as_deref(),
            &SORTABLE,
            "created_at",
            SortDirection::Desc,
        );

        let path = Self::doctors()
            .select(DOCTOR_WITH_COUNT)
            .eq_opt("is_active", is_active)
            .eq_opt("specialization", query.specialization.as_deref())
            .gte_opt("years_of_experience", min_experience)
            .lte_opt("years_of_experience", max_experience)
            .gte_opt("consultation_fee", min_fee)
            .lte_opt("consultation_fee", max_fee)
            .search(&SEARCHABLE, query.search.as_deref())
            .sort(&sort)
            .to_path();

        let page = PageRequest::new(query.page, query.per_page, ADMIN_PER_PAGE);
        Ok(self.supabase.fetch_page(&path, page).await?)
    }

    pub async fn get(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        let path = Self::doctors()
            .select(DOCTOR_WITH_COUNT)
            .eq("id", doctor_id)
            .limit(1)
            .to_path();

        self.supabase
            .select_one(&path)
            .await?
            .ok_or(DoctorError::NotFound)
    }

    /// True when another user already holds `value` in `column`.
    async fn taken(&self, column: &str, value: &str, except: Option<Uuid>) -> Result<bool, DoctorError> {
        let mut query = ListQuery::table("users").select("id").eq(column, value);
        if let Some(id) = except {
            query = query.neq("id", id);
        }
        Ok(self.supabase.count(&query.to_path()).await? > 0)
    }

    pub async fn create(&self, request: CreateDoctorRequest) -> Result<Doctor, DoctorError> {
        let mut v = Validator::new();

        let name = v.required("name", request.name.as_deref(), "Doctor name is required");
        v.max_length("name", name, 255, "Doctor name cannot exceed 255 characters");
        let email = v.required("email", request.email.as_deref(), "Email address is required");
        v.email("email", email, "Please provide a valid email address");
        v.max_length("email", email, 255, "Email address cannot exceed 255 characters");
        let password = v.required("password", request.password.as_deref(), "Password is required");
        v.min_length("password", password, 8, "Password must be at least 8 characters");
        v.max_length("password", password, 255, "Password cannot exceed 255 characters");
        let specialization = v.required("specialization", request.specialization.as_deref(), "Specialization is required");
        v.max_length("specialization", specialization, 100, "Specialization cannot exceed 100 characters");

        let phone = present(request.phone.as_deref());
        let address = present(request.address.as_deref());
        let license_number = present(request.license_number.as_deref());
        let profile_image = present(request.profile_image.as_deref());
        check_profile(
            &mut v,
            phone,
            address,
            license_number,
            request.years_of_experience,
            request.consultation_fee,
            profile_image,
        );

        let errors = v.into_errors();
        let (name, email, password, specialization) = match (name, email, password, specialization) {
            (Some(n), Some(e), Some(p), Some(s)) if errors.is_empty() => (n, e, p, s),
            _ => return Err(DoctorError::Validation(errors)),
        };

        if self.taken("email", email, None).await? {
            return Err(DoctorError::EmailTaken);
        }
        if let Some(license) = license_number {
            if self.taken("license_number", license, None).await? {
                return Err(DoctorError::LicenseTaken);
            }
        }

        let password_hash = hash_password(password)?;
        let path = ListQuery::table("users").select(DOCTOR_COLUMNS).to_path();
        let doctor: Doctor = self
            .supabase
            .insert(
                &path,
                json!({
                    "name": name,
                    "email": email,
                    "password": password_hash,
                    "role": "doctor",
                    "phone": phone,
                    "address": address,
                    "specialization": specialization,
                    "bio": present(request.bio.as_deref()),
                    "license_number": license_number,
                    "years_of_experience": request.years_of_experience,
                    "consultation_fee": request.consultation_fee,
                    "profile_image": profile_image,
                    "is_active": request.is_active.unwrap_or(true),
                }),
            )
            .await
            .map_err(duplicate)?;

        info!("Doctor {} created", doctor.id);
        Ok(doctor)
    }

    pub async fn update(&self, doctor_id: Uuid, request: UpdateDoctorRequest) -> Result<Doctor, DoctorError> {
        // existence first so a missing doctor is a 404 rather than a validation error
        self.get(doctor_id).await?;

        let mut v = Validator::new();
        let mut changes = Map::new();

        if request.name.is_some() {
            let name = v.required("name", request.name.as_deref(), "Doctor name is required");
            v.max_length("name", name, 255, "Doctor name cannot exceed 255 characters");
            changes.insert("name".to_string(), json!(name));
        }
        let mut new_email = None;
        if request.email.is_some() {
            let email = v.required("email", request.email.as_deref(), "Email address is required");
            v.email("email", email, "Please provide a valid email address");
            v.max_length("email", email, 255, "Email address cannot exceed 255 characters");
            new_email = email;
            changes.insert("email".to_string(), json!(email));
        }
        if request.specialization.is_some() {
            let spec = v.required("specialization", request.specialization.as_deref(), "Specialization is required");
            v.max_length("specialization", spec, 100, "Specialization cannot exceed 100 characters");
            changes.insert("specialization".to_string(), json!(spec));
        }

        // blank password means "keep the current one"
        let password = present(request.password.as_deref());
        v.min_length("password", password, 8, "Password must be at least 8 characters");
        v.max_length("password", password, 255, "Password cannot exceed 255 characters");

        let license_number = present(request.license_number.as_deref());
        check_profile(
            &mut v,
            present(request.phone.as_deref()),
            present(request.address.as_deref()),
            license_number,
            request.years_of_experience,
            request.consultation_fee,
            present(request.profile_image.as_deref()),
        );

        let errors = v.into_errors();
        if !errors.is_empty() {
            return Err(DoctorError::Validation(errors));
        }

        if let Some(email) = new_email {
            if self.taken("email", email, Some(doctor_id)).await? {
                return Err(DoctorError::EmailTaken);
            }
        }
        if let Some(license) = license_number {
            if self.taken("license_number", license, Some(doctor_id)).await? {
                return Err(DoctorError::LicenseTaken);
            }
        }

        for (column, value) in [
            ("phone", &request.phone),
            ("address", &request.address),
            ("bio", &request.bio),
            ("license_number", &request.license_number),
            ("profile_image", &request.profile_image),
        ] {
            if let Some(raw) = value.as_deref() {
                changes.insert(column.to_string(), json!(present(Some(raw))));
            }
        }
        if let Some(years) = request.years_of_experience {
            changes.insert("years_of_experience".to_string(), json!(years));
        }
        if let Some(fee) = request.consultation_fee {
            changes.insert("consultation_fee".to_string(), json!(fee));
        }
        if let Some(active) = request.is_active {
            changes.insert("is_active".to_string(), json!(active));
        }
        if let Some(password) = password {
            changes.insert("password".to_string(), json!(hash_password(password)?));
        }

        if changes.is_empty() {
            return self.get(doctor_id).await;
        }
        changes.insert("updated_at".to_string(), json!(Utc::now()));

        let path = Self::doctors()
            .select(DOCTOR_WITH_COUNT)
            .eq("id", doctor_id)
            .to_path();
        let rows: Vec<Doctor> = self
            .supabase
            .update(&path, Value::Object(changes))
            .await
            .map_err(duplicate)?;

        let doctor = rows.into_iter().next().ok_or(DoctorError::NotFound)?;
        info!("Doctor {} updated", doctor_id);
        Ok(doctor)
    }

    /// Refused while any appointment references the doctor. The check and the delete run in
    /// one database call so a booking cannot slip in between them.
    pub async fn delete(&self, doctor_id: Uuid) -> Result<(), DoctorError> {
        let outcome: Option<GuardedDelete> = self
            .supabase
            .rpc("delete_doctor_if_unbooked", json!({ "target_id": doctor_id }))
            .await?;
        let outcome = outcome.ok_or(DoctorError::NotFound)?;
        if !outcome.deleted {
            warn!("Refusing to delete doctor {} with {} appointments", doctor_id, outcome.appointments);
            return Err(DoctorError::HasAppointments(outcome.appointments));
        }
        info!("Doctor {} deleted", doctor_id);
        Ok(())
    }

    /// Flips `is_active`, guarded on the observed value.
    pub async fn set_active(&self, doctor_id: Uuid, active: bool) -> Result<Doctor, DoctorError> {
        let doctor = self.get(doctor_id).await?;
        let already = if active { DoctorError::AlreadyActive } else { DoctorError::AlreadyInactive };
        if doctor.is_active == active {
            return Err(already);
        }

        let path = Self::doctors()
            .select(DOCTOR_WITH_COUNT)
            .eq("id", doctor_id)
            .eq("is_active", doctor.is_active)
            .to_path();
        let rows: Vec<Doctor> = self
            .supabase
            .update(&path, json!({ "is_active": active, "updated_at": Utc::now() }))
            .await?;

        // no match: a concurrent request already flipped it
        let doctor = rows.into_iter().next().ok_or(already)?;
        info!("Doctor {} is_active set to {}", doctor_id, active);
        Ok(doctor)
    }

    pub async fn statistics(&self) -> Result<DoctorStatistics, DoctorError> {
        let path = Self::doctors()
            .select("id,name,specialization,years_of_experience,consultation_fee,is_active,appointments(count)")
            .to_path();
        let rows: Vec<DoctorStatRow> = self.supabase.select(&path).await?;
        Ok(summarize(&rows))
    }

    pub async fn specializations(&self) -> Result<Vec<String>, DoctorError> {
        let path = Self::doctors()
            .select("specialization")
            .not_null("specialization")
            .order("specialization", SortDirection::Asc)
            .to_path();
        let rows: Vec<SpecializationRow> = self.supabase.select(&path).await?;
        Ok(distinct_specializations(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(name: &str, spec: Option<&str>, years: Option<i32>, fee: Option<f64>, active: bool, booked: u64) -> DoctorStatRow {
        DoctorStatRow {
            id: Uuid::new_v4(),
            name: name.to_string(),
            specialization: spec.map(str::to_string),
            years_of_experience: years,
            consultation_fee: fee,
            is_active: active,
            appointments: vec![EmbeddedCount { count: booked }],
        }
    }

    #[test]
    fn statistics_summary() {
        let rows = vec![
            stat("A", Some("Cardiology"), Some(4), Some(100.0), true, 3),
            stat("B", Some("Cardiology"), Some(7), None, false, 9),
            stat("C", Some("Dermatology"), None, Some(150.5), true, 0),
        ];
        let stats = summarize(&rows);

        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.inactive, 1);
        assert_eq!(stats.total_appointments, 12);
        assert_eq!(stats.average_experience, 5.5);
        assert_eq!(stats.average_fee, 125.25);
        assert_eq!(stats.specializations[0].specialization, "Cardiology");
        assert_eq!(stats.specializations[0].count, 2);
        assert_eq!(stats.most_booked[0].name, "B");
        assert_eq!(stats.most_booked.len(), 3);
    }

    #[test]
    fn empty_statistics_are_zero() {
        let stats = summarize(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.average_fee, 0.0);
        assert!(stats.most_booked.is_empty());
    }

    #[test]
    fn specializations_are_distinct_and_sorted() {
        let rows = ["Surgery", "Cardiology", "Surgery", ""]
            .into_iter()
            .map(|s| SpecializationRow { specialization: Some(s.to_string()) })
            .chain([SpecializationRow { specialization: None }])
            .collect();
        assert_eq!(distinct_specializations(rows), vec!["Cardiology", "Surgery"]);
    }

    #[test]
    fn profile_bounds() {
        let mut v = Validator::new();
        check_profile(&mut v, Some("012345678901234567890"), None, None, Some(71), Some(-1.0), None);
        assert!(v.has("phone"));
        assert!(v.has("years_of_experience"));
        assert!(v.has("consultation_fee"));
        assert!(!v.has("address"));
    }

    #[test]
    fn duplicate_constraint_names_pick_the_field() {
        assert!(matches!(
            duplicate(DatabaseError::UniqueViolation("users_license_number_key".into())),
            DoctorError::LicenseTaken
        ));
        assert!(matches!(
            duplicate(DatabaseError::UniqueViolation("users_email_key".into())),
            DoctorError::EmailTaken
        ));
    }
}
