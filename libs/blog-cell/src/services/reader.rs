use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{Condition, ListQuery, Page, PageRequest, SortDirection, SortSpec, SupabaseClient};
use shared_utils::validation::{present, Validator};

use crate::models::{Blog, BlogError, PublicBlogQuery, BLOG_SELECT};
use crate::services::blog::{distinct_categories, distinct_tags, published_window, CategoryRow, TagsRow};

pub const PUBLIC_PER_PAGE: u32 = 10;
pub const FEATURED_LIMIT: u32 = 6;
pub const RELATED_LIMIT: u32 = 3;
const SORTABLE: [&str; 3] = ["title", "published_at", "views"];
const SEARCHABLE: [&str; 3] = ["title", "content", "excerpt"];

/// Conditions a related post must meet at least one of.
pub fn related_conditions(blog: &Blog) -> Vec<Condition> {
    let mut conditions = Vec::new();
    if let Some(category) = present(blog.category.as_deref()) {
        conditions.push(Condition::Eq("category".to_string(), category.to_string()));
    }
    if let Some(tags) = blog.tags.as_ref().filter(|tags| !tags.is_empty()) {
        conditions.push(Condition::Overlaps("tags".to_string(), tags.clone()));
    }
    conditions
}

/// Published posts as read on the public site.
pub struct BlogReaderService {
    supabase: SupabaseClient,
}

impl BlogReaderService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn published() -> ListQuery {
        ListQuery::table("blogs")
            .select(BLOG_SELECT)
            .eq("status", "published")
    }

    pub async fn list(&self, query: PublicBlogQuery) -> Result<Page<Blog>, BlogError> {
        debug!("Public blog listing with {:?}", query);

        let mut v = Validator::new();
        let author_id: Option<Uuid> = v.number("author_id", query.author_id.as_deref(), "The author id must be a valid UUID.");
        let base = Self::published()
            .eq_opt("category", query.category.as_deref())
            .eq_opt("author_id", author_id);
        let mut path = published_window(
            &mut v,
            base,
            "from_date",
            query.from_date.as_deref(),
            "to_date",
            query.to_date.as_deref(),
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
            "published_at",
            SortDirection::Desc,
        );
        let path = path
            .search(&SEARCHABLE, query.search.as_deref())
            .sort(&sort)
            .to_path();

        let page = PageRequest::new(query.page, query.per_page, PUBLIC_PER_PAGE);
        Ok(self.supabase.fetch_page(&path, page).await?)
    }

    /// The six most recently published posts.
    pub async fn featured(&self) -> Result<Vec<Blog>, BlogError> {
        let path = Self::published()
            .order("published_at", SortDirection::Desc)
            .limit(FEATURED_LIMIT)
            .to_path();
        Ok(self.supabase.select(&path).await?)
    }

    async fn find_published(&self, slug: &str) -> Result<Blog, BlogError> {
        let path = Self::published().eq("slug", slug).limit(1).to_path();
        self.supabase
            .select_one(&path)
            .await?
            .ok_or(BlogError::NotFound)
    }

    /// Fetches a published post and counts the read.
    pub async fn show(&self, slug: &str) -> Result<Blog, BlogError> {
        let mut blog = self.find_published(slug).await?;
        // the increment happens in one UPDATE; the returned value is the new count
        blog.views = self
            .supabase
            .rpc("increment_blog_views", json!({ "blog_id": blog.id }))
            .await?;
        Ok(blog)
    }

    /// Up to three other published posts sharing the category or any tag.
    pub async fn related(&self, slug: &str) -> Result<Vec<Blog>, BlogError> {
        let blog = self.find_published(slug).await?;
        let conditions = related_conditions(&blog);
        if conditions.is_empty() {
            return Ok(Vec::new());
        }

        let path = Self::published()
            .neq("id", blog.id)
            .any_of(&conditions)
            .order("published_at", SortDirection::Desc)
            .limit(RELATED_LIMIT)
            .to_path();
        Ok(self.supabase.select(&path).await?)
    }

    pub async fn categories(&self) -> Result<Vec<String>, BlogError> {
        let path = ListQuery::table("blogs")
            .select("category")
            .eq("status", "published")
            .not_null("category")
            .to_path();
        let rows: Vec<CategoryRow> = self.supabase.select(&path).await?;
        Ok(distinct_categories(rows))
    }

    pub async fn tags(&self) -> Result<Vec<String>, BlogError> {
        let path = ListQuery::table("blogs")
            .select("tags")
            .eq("status", "published")
            .not_null("tags")
            .to_path();
        let rows: Vec<TagsRow> = self.supabase.select(&path).await?;
        Ok(distinct_tags(rows))
    }
}
