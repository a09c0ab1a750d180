use tracing::debug;

use shared_config::AppConfig;
use shared_database::{ListQuery, Page, PageRequest, SortDirection, SortSpec, SupabaseClient};
use shared_utils::validation::Validator;

use crate::models::{PublicServiceQuery, Service, ServiceError, SERVICE_COLUMNS};

pub const PUBLIC_PER_PAGE: u32 = 12;
pub const FEATURED_LIMIT: u32 = 6;
const SORTABLE: [&str; 4] = ["name", "price", "duration", "order"];
const SEARCHABLE: [&str; 2] = ["name", "description"];

/// Active services as shown on the public site.
pub struct ServiceCatalogService {
    supabase: SupabaseClient,
}

impl ServiceCatalogService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn active_services() -> ListQuery {
        ListQuery::table("services")
            .select(SERVICE_COLUMNS)
            .eq("is_active", true)
    }

    pub async fn list(&self, query: PublicServiceQuery) -> Result<Page<Service>, ServiceError> {
        debug!("Public service listing with {:?}", query);

        let mut v = Validator::new();
        let min_price: Option<f64> = v.number("min_price", query.min_price.as_deref(), "The min price must be a number.");
        let max_price: Option<f64> = v.number("max_price", query.max_price.as_deref(), "The max price must be a number.");
        let min_duration: Option<i32> = v.number("min_duration", query.min_duration.as_deref(), "The min duration must be a number.");
        let max_duration: Option<i32> = v.number("max_duration", query.max_duration.as_deref(), "The max duration must be a number.");
        let errors = v.into_errors();
        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors));
        }

        let sort = SortSpec::resolve(
            query.sort_by.as_deref(),
            query.sort_order.as_deref(),
            &SORTABLE,
            "order",
            SortDirection::Asc,
        )
        .rename("order", "display_order");

        let path = Self::active_services()
            .gte_opt("price", min_price)
            .lte_opt("price", max_price)
            .gte_opt("duration", min_duration)
            .lte_opt("duration", max_duration)
            .search(&SEARCHABLE, query.search.as_deref())
            .sort(&sort)
            .to_path();

        let page = PageRequest::new(query.page, query.per_page, PUBLIC_PER_PAGE);
        Ok(self.supabase.fetch_page(&path, page).await?)
    }

    /// First six active services in display order.
    pub async fn featured(&self) -> Result<Vec<Service>, ServiceError> {
        let path = Self::active_services()
            .order("display_order", SortDirection::Asc)
            .limit(FEATURED_LIMIT)
            .to_path();
        Ok(self.supabase.select(&path).await?)
    }

    pub async fn show(&self, slug: &str) -> Result<Service, ServiceError> {
        let path = Self::active_services().eq("slug", slug).limit(1).to_path();
        self.supabase
            .select_one(&path)
            .await?
            .ok_or(ServiceError::NotFound)
    }
}
