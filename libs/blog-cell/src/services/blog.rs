use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Map};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DatabaseError, ListQuery, Page, PageRequest, SortDirection, SortSpec, SupabaseClient};
use shared_models::response::format_timestamp;
use shared_utils::slug::slugify;
use shared_utils::validation::{present, Validator};

use crate::models::{
    Blog, BlogError, BlogListQuery, BlogStatistics, BlogStatus, CategoryCount, CreateBlogRequest,
    RecentBlog, UpdateBlogRequest, ViewedBlog, BLOG_SELECT,
};
use crate::services::publishing::{guarded_update, parse_published_at, status_changes};

pub const ADMIN_PER_PAGE: u32 = 15;
const SORTABLE: [&str; 5] = ["title", "status", "views", "published_at", "created_at"];
const SEARCHABLE: [&str; 3] = ["title", "excerpt", "content"];

pub(crate) async fn find_blog(client: &SupabaseClient, blog_id: Uuid) -> Result<Blog, BlogError> {
    let path = ListQuery::table("blogs")
        .select(BLOG_SELECT)
        .eq("id", blog_id)
        .limit(1)
        .to_path();
    client.select_one(&path).await?.ok_or(BlogError::NotFound)
}

pub(crate) fn duplicate(err: DatabaseError) -> BlogError {
    match err {
        DatabaseError::UniqueViolation(msg) if msg.contains("slug") => BlogError::SlugTaken,
        DatabaseError::UniqueViolation(_) => BlogError::TitleTaken,
        other => BlogError::Database(other),
    }
}

/// Trims tags, drops blanks and flags any over 50 characters.
fn clean_tags(v: &mut Validator, tags: &[String]) -> Vec<String> {
    let mut cleaned = Vec::with_capacity(tags.len());
    for (i, tag) in tags.iter().enumerate() {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        if tag.chars().count() > 50 {
            v.add(&format!("tags.{}", i), "Each tag cannot exceed 50 characters");
        }
        cleaned.push(tag.to_string());
    }
    cleaned
}

/// Checks shared by create and update for the optional columns.
fn check_details(v: &mut Validator, excerpt: Option<&str>, featured_image: Option<&str>, category: Option<&str>) {
    v.max_length("excerpt", excerpt, 500, "Excerpt cannot exceed 500 characters");
    v.max_length("featured_image", featured_image, 255, "Featured image cannot exceed 255 characters");
    v.max_length("category", category, 100, "Category name cannot exceed 100 characters");
}

fn requested_status(v: &mut Validator, raw: Option<&str>) -> Option<BlogStatus> {
    let raw = present(raw)?;
    let status = BlogStatus::parse(raw);
    if status.is_none() {
        v.add("status", "Status must be draft, published, or archived");
    }
    status
}

fn requested_published_at(v: &mut Validator, raw: Option<&str>) -> Option<chrono::DateTime<Utc>> {
    let raw = present(raw)?;
    let parsed = parse_published_at(raw);
    if parsed.is_none() {
        v.add("published_at", "Published date must be a valid date");
    }
    parsed
}

fn resolve_slug(v: &mut Validator, explicit: Option<&str>, title: &str) -> String {
    let slug = slugify(explicit.unwrap_or(title));
    v.check(!slug.is_empty(), "slug", "URL slug must contain letters or numbers");
    slug
}

#[derive(Debug, Deserialize)]
struct AuthorName {
    name: String,
}

#[derive(Debug, Deserialize)]
struct BlogStatRow {
    id: Uuid,
    title: String,
    slug: String,
    status: BlogStatus,
    views: i64,
    category: Option<String>,
    published_at: Option<chrono::DateTime<Utc>>,
    #[serde(default)]
    author: Option<AuthorName>,
}

impl BlogStatRow {
    fn author_name(&self) -> String {
        self.author
            .as_ref()
            .map(|a| a.name.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

fn summarize(rows: &[BlogStatRow]) -> BlogStatistics {
    let count = |status: BlogStatus| rows.iter().filter(|r| r.status == status).count() as u64;
    let total_views: i64 = rows.iter().map(|r| r.views).sum();
    let average_views = if rows.is_empty() {
        0.0
    } else {
        (total_views as f64 / rows.len() as f64).round()
    };

    let mut by_views: Vec<&BlogStatRow> = rows.iter().collect();
    by_views.sort_by(|a, b| b.views.cmp(&a.views));
    let most_viewed = by_views
        .into_iter()
        .take(5)
        .map(|r| ViewedBlog {
            id: r.id,
            title: r.title.clone(),
            slug: r.slug.clone(),
            views: r.views,
            author: r.author_name(),
        })
        .collect();

    let mut published: Vec<&BlogStatRow> = rows.iter().filter(|r| r.status == BlogStatus::Published).collect();
    published.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    let recent_published = published
        .into_iter()
        .take(5)
        .map(|r| RecentBlog {
            id: r.id,
            title: r.title.clone(),
            slug: r.slug.clone(),
            published_at: format_timestamp(r.published_at),
            author: r.author_name(),
        })
        .collect();

    let mut by_category: BTreeMap<&str, u64> = BTreeMap::new();
    for category in rows.iter().filter_map(|r| r.category.as_deref()) {
        *by_category.entry(category).or_default() += 1;
    }
    let mut categories: Vec<CategoryCount> = by_category
        .into_iter()
        .map(|(category, count)| CategoryCount {
            category: category.to_string(),
            count,
        })
        .collect();
    categories.sort_by(|a, b| b.count.cmp(&a.count));

    BlogStatistics {
        total: rows.len() as u64,
        published: count(BlogStatus::Published),
        draft: count(BlogStatus::Draft),
        archived: count(BlogStatus::Archived),
        total_views,
        average_views,
        most_viewed,
        recent_published,
        categories,
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CategoryRow {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagsRow {
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Distinct, sorted category names.
pub(crate) fn distinct_categories(rows: Vec<CategoryRow>) -> Vec<String> {
    let mut names: Vec<String> = rows
        .into_iter()
        .filter_map(|r| r.category)
        .filter(|c| !c.trim().is_empty())
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Every tag used by any row, distinct and sorted.
pub(crate) fn distinct_tags(rows: Vec<TagsRow>) -> Vec<String> {
    let mut tags: Vec<String> = rows.into_iter().flat_map(|r| r.tags.unwrap_or_default()).collect();
    tags.sort();
    tags.dedup();
    tags
}

/// Validates optional `from`/`to` dates; `to` is inclusive of the whole day.
pub(crate) fn published_window(
    v: &mut Validator,
    query: ListQuery,
    from_field: &str,
    from: Option<&str>,
    to_field: &str,
    to: Option<&str>,
) -> ListQuery {
    let from: Option<NaiveDate> = v.date(from_field, from, &format!("The {} is not a valid date.", from_field.replace('_', " ")));
    let to: Option<NaiveDate> = v.date(to_field, to, &format!("The {} is not a valid date.", to_field.replace('_', " ")));

    let mut query = query.gte_opt("published_at", from);
    if let Some(next_day) = to.and_then(|d| d.succ_opt()) {
        query = query.lt("published_at", next_day);
    }
    query
}

pub struct BlogService {
    supabase: SupabaseClient,
}

impl BlogService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list(&self, query: BlogListQuery) -> Result<Page<Blog>, BlogError> {
        debug!("Listing blogs with {:?}", query);

        let mut v = Validator::new();
        let status = requested_status(&mut v, query.status.as_deref());
        let author_id: Option<Uuid> = v.number("author_id", query.author_id.as_deref(), "The author id must be a valid UUID.");

        let base = ListQuery::table("blogs")
            .select(BLOG_SELECT)
            .eq_opt("status", status)
            .eq_opt("category", query.category.as_deref())
            .eq_opt("author_id", author_id);
        let mut path = published_window(
            &mut v,
            base,
            "date_from",
            query.date_from.as_deref(),
            "date_to",
            query.date_to.as_deref(),
        );

        let errors = v.into_errors();
        if !errors.is_empty() {
            return Err(BlogError::Validation(errors));
        }

        if let Some(tag) = present(query.tag.as_deref()) {
            path = path.contains("tags", &[tag]);
        }

        let sort = SortSpec::resolve(
            query.sort_by.as_deref(),
            query.sort_order.as_deref(),
            &SORTABLE,
            "created_at",
            SortDirection::Desc,
        );
        let path = path
            .search(&SEARCHABLE, query.search.as_deref())
            .sort(&sort)
            .to_path();

        let page = PageRequest::new(query.page, query.per_page, ADMIN_PER_PAGE);
        Ok(self.supabase.fetch_page(&path, page).await?)
    }

    pub async fn get(&self, blog_id: Uuid) -> Result<Blog, BlogError> {
        find_blog(&self.supabase, blog_id).await
    }

    /// True when another blog already holds `value` in `column`.
    async fn taken(&self, column: &str, value: &str, except: Option<Uuid>) -> Result<bool, BlogError> {
        let mut query = ListQuery::table("blogs").select("id").eq(column, value);
        if let Some(id) = except {
            query = query.neq("id", id);
        }
        Ok(self.supabase.count(&query.to_path()).await? > 0)
    }

    async fn ensure_unique(&self, title: Option<&str>, slug: Option<&str>, except: Option<Uuid>) -> Result<(), BlogError> {
        if let Some(title) = title {
            if self.taken("title", title, except).await? {
                return Err(BlogError::TitleTaken);
            }
        }
        if let Some(slug) = slug {
            if self.taken("slug", slug, except).await? {
                return Err(BlogError::SlugTaken);
            }
        }
        Ok(())
    }

    pub async fn create(&self, author_id: Uuid, request: CreateBlogRequest) -> Result<Blog, BlogError> {
        let mut v = Validator::new();

        let title = v.required("title", request.title.as_deref(), "Blog title is required");
        v.max_length("title", title, 255, "Blog title cannot exceed 255 characters");
        let content = v.required("content", request.content.as_deref(), "Blog content is required");

        let explicit_slug = present(request.slug.as_deref());
        v.max_length("slug", explicit_slug, 255, "URL slug cannot exceed 255 characters");
        let excerpt = present(request.excerpt.as_deref());
        let featured_image = present(request.featured_image.as_deref());
        let category = present(request.category.as_deref());
        check_details(&mut v, excerpt, featured_image, category);
        let tags = clean_tags(&mut v, request.tags.as_deref().unwrap_or_default());
        let status = requested_status(&mut v, request.status.as_deref()).unwrap_or(BlogStatus::Draft);
        let published_at = requested_published_at(&mut v, request.published_at.as_deref());
        let slug = title.map(|t| resolve_slug(&mut v, explicit_slug, t));

        let errors = v.into_errors();
        let (title, content, slug) = match (title, content, slug) {
            (Some(t), Some(c), Some(s)) if errors.is_empty() => (t, c, s),
            _ => return Err(BlogError::Validation(errors)),
        };

        self.ensure_unique(Some(title), Some(&slug), None).await?;

        let mut row = status_changes(status, published_at, Utc::now());
        row.insert("author_id".to_string(), json!(author_id));
        row.insert("title".to_string(), json!(title));
        row.insert("slug".to_string(), json!(slug));
        row.insert("excerpt".to_string(), json!(excerpt));
        row.insert("content".to_string(), json!(content));
        row.insert("featured_image".to_string(), json!(featured_image));
        row.insert("category".to_string(), json!(category));
        row.insert("tags".to_string(), json!(tags));

        let path = ListQuery::table("blogs").select(BLOG_SELECT).to_path();
        let blog: Blog = self
            .supabase
            .insert(&path, serde_json::Value::Object(row))
            .await
            .map_err(duplicate)?;

        info!("Blog {} created by {} as {}", blog.id, author_id, blog.status);
        Ok(blog)
    }

    pub async fn update(&self, blog_id: Uuid, request: UpdateBlogRequest) -> Result<Blog, BlogError> {
        let current = self.get(blog_id).await?;

        let mut v = Validator::new();
        let mut changes = Map::new();

        let mut new_title = None;
        if request.title.is_some() {
            new_title = v.required("title", request.title.as_deref(), "Blog title is required");
            v.max_length("title", new_title, 255, "Blog title cannot exceed 255 characters");
        }
        if request.content.is_some() {
            let content = v.required("content", request.content.as_deref(), "Blog content is required");
            changes.insert("content".to_string(), json!(content));
        }

        let explicit_slug = present(request.slug.as_deref());
        v.max_length("slug", explicit_slug, 255, "URL slug cannot exceed 255 characters");
        check_details(
            &mut v,
            present(request.excerpt.as_deref()),
            present(request.featured_image.as_deref()),
            present(request.category.as_deref()),
        );
        let tags = request.tags.as_deref().map(|tags| clean_tags(&mut v, tags));
        let status = requested_status(&mut v, request.status.as_deref());
        let published_at = requested_published_at(&mut v, request.published_at.as_deref());

        // the slug follows a retitled blog unless one is supplied
        let retitled = new_title.filter(|t| *t != current.title);
        let new_slug = match (explicit_slug, retitled) {
            (Some(s), _) => Some(resolve_slug(&mut v, Some(s), &current.title)),
            (None, Some(title)) => Some(resolve_slug(&mut v, None, title)),
            (None, None) => None,
        };

        let errors = v.into_errors();
        if !errors.is_empty() {
            return Err(BlogError::Validation(errors));
        }

        self.ensure_unique(new_title, new_slug.as_deref(), Some(blog_id)).await?;

        if let Some(title) = new_title {
            changes.insert("title".to_string(), json!(title));
        }
        if let Some(slug) = new_slug {
            changes.insert("slug".to_string(), json!(slug));
        }
        for (column, value) in [
            ("excerpt", &request.excerpt),
            ("featured_image", &request.featured_image),
            ("category", &request.category),
        ] {
            if let Some(raw) = value.as_deref() {
                changes.insert(column.to_string(), json!(present(Some(raw))));
            }
        }
        if let Some(tags) = tags {
            changes.insert("tags".to_string(), json!(tags));
        }

        let target = status.unwrap_or(current.status);
        if target != current.status {
            changes.extend(status_changes(target, published_at, Utc::now()));
        } else if let (BlogStatus::Published, Some(at)) = (target, published_at) {
            changes.insert("published_at".to_string(), json!(at));
        }

        if changes.is_empty() {
            return Ok(current);
        }

        let blog = guarded_update(&self.supabase, &current, changes).await?;
        info!("Blog {} updated", blog_id);
        Ok(blog)
    }

    pub async fn delete(&self, blog_id: Uuid) -> Result<(), BlogError> {
        let path = ListQuery::table("blogs").eq("id", blog_id).to_path();
        if self.supabase.delete(&path).await? == 0 {
            return Err(BlogError::NotFound);
        }
        info!("Blog {} deleted", blog_id);
        Ok(())
    }

    pub async fn statistics(&self) -> Result<BlogStatistics, BlogError> {
        let path = ListQuery::table("blogs")
            .select("id,title,slug,status,views,category,published_at,author:users!author_id(name)")
            .to_path();
        let rows: Vec<BlogStatRow> = self.supabase.select(&path).await?;
        Ok(summarize(&rows))
    }

    pub async fn categories(&self) -> Result<Vec<String>, BlogError> {
        let path = ListQuery::table("blogs")
            .select("category")
            .not_null("category")
            .to_path();
        let rows: Vec<CategoryRow> = self.supabase.select(&path).await?;
        Ok(distinct_categories(rows))
    }

    pub async fn tags(&self) -> Result<Vec<String>, BlogError> {
        let path = ListQuery::table("blogs").select("tags").not_null("tags").to_path();
        let rows: Vec<TagsRow> = self.supabase.select(&path).await?;
        Ok(distinct_tags(rows))
    }
}
