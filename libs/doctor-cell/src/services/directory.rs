use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{ListQuery, Page, PageRequest, SortDirection, SortSpec, SupabaseClient};
use shared_utils::validation::Validator;

use crate::models::{Doctor, DoctorError, PublicDoctorQuery, DOCTOR_COLUMNS};
use crate::services::doctor::{distinct_specializations, SpecializationRow};

pub const PUBLIC_PER_PAGE: u32 = 12;
pub const FEATURED_LIMIT: u32 = 6;
const SORTABLE: [&str; 4] = ["name", "specialization", "consultation_fee", "years_of_experience"];
const SEARCHABLE: [&str; 3] = ["name", "bio", "specialization"];

/// Read-only view of active doctors for the public site.
pub struct DoctorDirectoryService {
    supabase: SupabaseClient,
}

impl DoctorDirectoryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn active_doctors() -> ListQuery {
        ListQuery::table("users")
            .select(DOCTOR_COLUMNS)
            .eq("role", "doctor")
            .eq("is_active", true)
    }

    pub async fn list(&self, query: PublicDoctorQuery) -> Result<Page<Doctor>, DoctorError> {
        debug!("Public doctor listing with {:?}", query);

        let mut v = Validator::new();
        let min_fee: Option<f64> = v.number("min_fee", query.min_fee.as_deref(), "The min fee must be a number.");
        let max_fee: Option<f64> = v.number("max_fee", query.max_fee.as_deref(), "The max fee must be a number.");
        let min_experience: Option<i32> = v.number(
            "min_experience",
            query.min_experience.as_deref(),
            "The min experience must be a number.",
        );
        let errors = v.into_errors();
        if !errors.is_empty() {
            return Err(DoctorError::Validation(errors));
        }

        let sort = SortSpec::resolve(
            query.sort_by.as_deref(),
            query.sort_order.as_deref(),
            &SORTABLE,
            "name",
            SortDirection::Asc,
        );

        let path = Self::active_doctors()
            .eq_opt("specialization", query.specialization.as_deref())
            .gte_opt("consultation_fee", min_fee)
            .lte_opt("consultation_fee", max_fee)
            .gte_opt("years_of_experience", min_experience)
            .search(&SEARCHABLE, query.search.as_deref())
            .sort(&sort)
            .to_path();

        let page = PageRequest::new(query.page, query.per_page, PUBLIC_PER_PAGE);
        Ok(self.supabase.fetch_page(&path, page).await?)
    }

    /// The six most recently added active doctors.
    pub async fn featured(&self) -> Result<Vec<Doctor>, DoctorError> {
        let path = Self::active_doctors()
            .order("created_at", SortDirection::Desc)
            .limit(FEATURED_LIMIT)
            .to_path();
        Ok(self.supabase.select(&path).await?)
    }

    pub async fn show(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        let path = Self::active_doctors().eq("id", doctor_id).limit(1).to_path();
        self.supabase
            .select_one(&path)
            .await?
            .ok_or(DoctorError::NotFound)
    }

    pub async fn specializations(&self) -> Result<Vec<String>, DoctorError> {
        let path = ListQuery::table("users")
            .select("specialization")
            .eq("role", "doctor")
            .eq("is_active", true)
            .not_null("specialization")
            .to_path();
        let rows: Vec<SpecializationRow> = self.supabase.select(&path).await?;
        Ok(distinct_specializations(rows))
    }
}
