use std::collections::HashSet;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DatabaseError, ListQuery, Page, PageRequest, SortDirection, SortSpec, SupabaseClient};
use shared_utils::slug::slugify;
use shared_utils::validation::{present, Validator};

use crate::models::{
    CreateServiceRequest, EmbeddedCount, GuardedDelete, PopularService, ReorderRequest, Service, ServiceError,
    ServiceListQuery, ServiceStatistics, UpdateServiceRequest, SERVICE_COLUMNS, SERVICE_WITH_COUNT,
};

pub const ADMIN_PER_PAGE: u32 = 15;
const SORTABLE: [&str; 5] = ["name", "price", "duration", "order", "created_at"];
const SEARCHABLE: [&str; 3] = ["name", "description", "short_description"];
const MAX_PRICE: f64 = 999_999.99;
const MAX_DURATION: i32 = 1440;

/// Checks shared by create and update once the fields are known to be present.
#[allow(clippy::too_many_arguments)]
fn check_details(
    v: &mut Validator,
    slug: Option<&str>,
    short_description: Option<&str>,
    price: Option<f64>,
    duration: Option<i32>,
    icon: Option<&str>,
    image: Option<&str>,
    order: Option<i32>,
) {
    v.max_length("slug", slug, 255, "URL slug cannot exceed 255 characters");
    v.max_length("short_description", short_description, 500, "Short description cannot exceed 500 characters");
    v.max_length("icon", icon, 255, "Icon cannot exceed 255 characters");
    v.max_length("image", image, 255, "Image cannot exceed 255 characters");

    if let Some(price) = price {
        v.check(price >= 0.0, "price", "Price cannot be negative");
        v.check(price <= MAX_PRICE, "price", "Price cannot exceed 999,999.99");
    }
    if let Some(duration) = duration {
        v.check(duration >= 1, "duration", "Duration must be at least 1 minute");
        v.check(duration <= MAX_DURATION, "duration", "Duration cannot exceed 1440 minutes (24 hours)");
    }
    v.range("order", order, 0, None, "Order cannot be negative");
}

/// Slug as stored: the explicit one if given, else derived from the name.
fn resolve_slug(v: &mut Validator, explicit: Option<&str>, name: &str) -> String {
    let slug = match explicit {
        Some(s) => slugify(s),
        None => slugify(name),
    };
    v.check(!slug.is_empty(), "slug", "URL slug must contain letters or numbers");
    slug
}

fn duplicate(err: DatabaseError) -> ServiceError {
    match err {
        DatabaseError::UniqueViolation(msg) if msg.contains("slug") => ServiceError::SlugTaken,
        DatabaseError::UniqueViolation(_) => ServiceError::NameTaken,
        other => ServiceError::Database(other),
    }
}

#[derive(Debug, Deserialize)]
struct ServiceStatRow {
    id: Uuid,
    name: String,
    price: f64,
    duration: i32,
    is_active: bool,
    appointments: Vec<EmbeddedCount>,
}

impl ServiceStatRow {
    fn appointments_count(&self) -> u64 {
        self.appointments.first().map(|c| c.count).unwrap_or(0)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0u32), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn summarize(rows: &[ServiceStatRow]) -> ServiceStatistics {
    let active = rows.iter().filter(|r| r.is_active).count() as u64;

    let mut most_popular: Vec<PopularService> = rows
        .iter()
        .map(|r| PopularService {
            id: r.id,
            name: r.name.clone(),
            appointments_count: r.appointments_count(),
        })
        .collect();
    most_popular.sort_by(|a, b| b.appointments_count.cmp(&a.appointments_count));
    most_popular.truncate(5);

    ServiceStatistics {
        total: rows.len() as u64,
        active,
        inactive: rows.len() as u64 - active,
        total_appointments: rows.iter().map(ServiceStatRow::appointments_count).sum(),
        average_price: (mean(rows.iter().map(|r| r.price)) * 100.0).round() / 100.0,
        average_duration: mean(rows.iter().map(|r| f64::from(r.duration))).round(),
        most_popular,
    }
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: Uuid,
}

pub struct ServiceService {
    supabase: SupabaseClient,
}

impl ServiceService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list(&self, query: ServiceListQuery) -> Result<Page<Service>, ServiceError> {
        debug!("Listing services with {:?}", query);

        let mut v = Validator::new();
        let is_active = v.boolean("is_active", query.is_active.as_deref(), "The is active field must be true or false.");
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

        let path = ListQuery::table("services")
            .select(SERVICE_WITH_COUNT)
            .eq_opt("is_active", is_active)
            .gte_opt("price", min_price)
            .lte_opt("price", max_price)
            .gte_opt("duration", min_duration)
            .lte_opt("duration", max_duration)
            .search(&SEARCHABLE, query.search.as_deref())
            .sort(&sort)
            .to_path();

        let page = PageRequest::new(query.page, query.per_page, ADMIN_PER_PAGE);
        Ok(self.supabase.fetch_page(&path, page).await?)
    }

    pub async fn get(&self, service_id: Uuid) -> Result<Service, ServiceError> {
        let path = ListQuery::table("services")
            .select(SERVICE_WITH_COUNT)
            .eq("id", service_id)
            .limit(1)
            .to_path();

        self.supabase
            .select_one(&path)
            .await?
            .ok_or(ServiceError::NotFound)
    }

    /// True when another service already holds `value` in `column`.
    async fn taken(&self, column: &str, value: &str, except: Option<Uuid>) -> Result<bool, ServiceError> {
        let mut query = ListQuery::table("services").select("id").eq(column, value);
        if let Some(id) = except {
            query = query.neq("id", id);
        }
        Ok(self.supabase.count(&query.to_path()).await? > 0)
    }

    async fn ensure_unique(&self, name: Option<&str>, slug: Option<&str>, except: Option<Uuid>) -> Result<(), ServiceError> {
        if let Some(name) = name {
            if self.taken("name", name, except).await? {
                return Err(ServiceError::NameTaken);
            }
        }
        if let Some(slug) = slug {
            if self.taken("slug", slug, except).await? {
                return Err(ServiceError::SlugTaken);
            }
        }
        Ok(())
    }

    pub async fn create(&self, request: CreateServiceRequest) -> Result<Service, ServiceError> {
        let mut v = Validator::new();

        let name = v.required("name", request.name.as_deref(), "Service name is required");
        v.max_length("name", name, 255, "Service name cannot exceed 255 characters");
        let description = v.required("description", request.description.as_deref(), "Service description is required");
        if request.price.is_none() {
            v.add("price", "Service price is required");
        }
        if request.duration.is_none() {
            v.add("duration", "Service duration is required");
        }

        let explicit_slug = present(request.slug.as_deref());
        let short_description = present(request.short_description.as_deref());
        let icon = present(request.icon.as_deref());
        let image = present(request.image.as_deref());
        check_details(
            &mut v,
            explicit_slug,
            short_description,
            request.price,
            request.duration,
            icon,
            image,
            request.order,
        );
        let slug = name.map(|n| resolve_slug(&mut v, explicit_slug, n));

        let errors = v.into_errors();
        let (name, description, slug, price, duration) =
            match (name, description, slug, request.price, request.duration) {
                (Some(n), Some(d), Some(s), Some(p), Some(m)) if errors.is_empty() => (n, d, s, p, m),
                _ => return Err(ServiceError::Validation(errors)),
            };

        self.ensure_unique(Some(name), Some(&slug), None).await?;

        let path = ListQuery::table("services").select(SERVICE_COLUMNS).to_path();
        let service: Service = self
            .supabase
            .insert(
                &path,
                json!({
                    "name": name,
                    "slug": slug,
                    "description": description,
                    "short_description": short_description,
                    "price": price,
                    "duration": duration,
                    "icon": icon,
                    "image": image,
                    "is_active": request.is_active.unwrap_or(true),
                    "display_order": request.order.unwrap_or(0),
                }),
            )
            .await
            .map_err(duplicate)?;

        info!("Service {} created with slug {}", service.id, service.slug);
        Ok(service)
    }

    pub async fn update(&self, service_id: Uuid, request: UpdateServiceRequest) -> Result<Service, ServiceError> {
        let current = self.get(service_id).await?;

        let mut v = Validator::new();
        let mut changes = Map::new();

        let mut new_name = None;
        if request.name.is_some() {
            new_name = v.required("name", request.name.as_deref(), "Service name is required");
            v.max_length("name", new_name, 255, "Service name cannot exceed 255 characters");
        }
        if request.description.is_some() {
            let description = v.required("description", request.description.as_deref(), "Service description is required");
            changes.insert("description".to_string(), json!(description));
        }

        let explicit_slug = present(request.slug.as_deref());
        check_details(
            &mut v,
            explicit_slug,
            present(request.short_description.as_deref()),
            request.price,
            request.duration,
            present(request.icon.as_deref()),
            present(request.image.as_deref()),
            request.order,
        );

        // the slug follows a renamed service unless one is supplied
        let renamed = new_name.filter(|n| *n != current.name);
        let new_slug = match (explicit_slug, renamed) {
            (Some(s), _) => Some(resolve_slug(&mut v, Some(s), &current.name)),
            (None, Some(name)) => Some(resolve_slug(&mut v, None, name)),
            (None, None) => None,
        };

        let errors = v.into_errors();
        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors));
        }

        self.ensure_unique(new_name, new_slug.as_deref(), Some(service_id)).await?;

        if let Some(name) = new_name {
            changes.insert("name".to_string(), json!(name));
        }
        if let Some(slug) = new_slug {
            changes.insert("slug".to_string(), json!(slug));
        }
        for (column, value) in [
            ("short_description", &request.short_description),
            ("icon", &request.icon),
            ("image", &request.image),
        ] {
            if let Some(raw) = value.as_deref() {
                changes.insert(column.to_string(), json!(present(Some(raw))));
            }
        }
        if let Some(price) = request.price {
            changes.insert("price".to_string(), json!(price));
        }
        if let Some(duration) = request.duration {
            changes.insert("duration".to_string(), json!(duration));
        }
        if let Some(active) = request.is_active {
            changes.insert("is_active".to_string(), json!(active));
        }
        if let Some(order) = request.order {
            changes.insert("display_order".to_string(), json!(order));
        }

        if changes.is_empty() {
            return Ok(current);
        }
        changes.insert("updated_at".to_string(), json!(Utc::now()));

        let path = ListQuery::table("services")
            .select(SERVICE_WITH_COUNT)
            .eq("id", service_id)
            .to_path();
        let rows: Vec<Service> = self
            .supabase
            .update(&path, Value::Object(changes))
            .await
            .map_err(duplicate)?;

        let service = rows.into_iter().next().ok_or(ServiceError::NotFound)?;
        info!("Service {} updated", service_id);
        Ok(service)
    }

    /// Refused while any appointment references the service; checked and deleted in one call.
    pub async fn delete(&self, service_id: Uuid) -> Result<(), ServiceError> {
        let outcome: Option<GuardedDelete> = self
            .supabase
            .rpc("delete_service_if_unused", json!({ "target_id": service_id }))
            .await?;
        let outcome = outcome.ok_or(ServiceError::NotFound)?;
        if !outcome.deleted {
            warn!("Refusing to delete service {} with {} appointments", service_id, outcome.appointments);
            return Err(ServiceError::HasAppointments(outcome.appointments));
        }
        info!("Service {} deleted", service_id);
        Ok(())
    }

    /// Flips `is_active`, guarded on the observed value.
    pub async fn set_active(&self, service_id: Uuid, active: bool) -> Result<Service, ServiceError> {
        let service = self.get(service_id).await?;
        let already = if active { ServiceError::AlreadyActive } else { ServiceError::AlreadyInactive };
        if service.is_active == active {
            return Err(already);
        }

        let path = ListQuery::table("services")
            .select(SERVICE_WITH_COUNT)
            .eq("id", service_id)
            .eq("is_active", service.is_active)
            .to_path();
        let rows: Vec<Service> = self
            .supabase
            .update(&path, json!({ "is_active": active, "updated_at": Utc::now() }))
            .await?;

        let service = rows.into_iter().next().ok_or(already)?;
        info!("Service {} is_active set to {}", service_id, active);
        Ok(service)
    }

    /// Rewrites display order for every listed service in one RPC call.
    pub async fn reorder(&self, request: ReorderRequest) -> Result<(), ServiceError> {
        let mut v = Validator::new();
        let items = request.services.unwrap_or_default();
        if items.is_empty() {
            v.add("services", "The services field is required.");
        }
        for (i, item) in items.iter().enumerate() {
            let field = format!("services.{}.order", i);
            v.range(&field, Some(item.order), 0, None, &format!("The {} field must be at least 0.", field));
        }
        let errors = v.into_errors();
        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors));
        }

        let ids: Vec<Uuid> = items.iter().map(|item| item.id).collect();
        let path = ListQuery::table("services").select("id").in_list("id", &ids).to_path();
        let known: HashSet<Uuid> = self
            .supabase
            .select::<IdRow>(&path)
            .await?
            .into_iter()
            .map(|row| row.id)
            .collect();

        let mut v = Validator::new();
        for (i, item) in items.iter().enumerate() {
            let field = format!("services.{}.id", i);
            v.check(known.contains(&item.id), &field, &format!("The selected {} is invalid.", field));
        }
        let errors = v.into_errors();
        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors));
        }

        let payload: Vec<Value> = items
            .iter()
            .map(|item| json!({ "id": item.id, "order": item.order }))
            .collect();
        let _: Value = self
            .supabase
            .rpc("reorder_services", json!({ "items": payload }))
            .await?;

        info!("Reordered {} services", items.len());
        Ok(())
    }

    pub async fn statistics(&self) -> Result<ServiceStatistics, ServiceError> {
        let path = ListQuery::table("services")
            .select("id,name,price,duration,is_active,appointments(count)")
            .to_path();
        let rows: Vec<ServiceStatRow> = self.supabase.select(&path).await?;
        Ok(summarize(&rows))
    }
}
