use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::{AppError, ValidationErrors};
use shared_models::response::format_timestamp;

/// Blog columns with the author embedded through `blogs.author_id`.
pub const BLOG_SELECT: &str = "id,author_id,title,slug,excerpt,content,featured_image,category,tags,\
status,views,published_at,created_at,updated_at,author:users!author_id(id,name,email)";

const WORDS_PER_MINUTE: usize = 200;

// ==============================================================================
// CORE BLOG MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlogStatus {
    Draft,
    Published,
    Archived,
}

impl BlogStatus {
    pub const ALL: [BlogStatus; 3] = [BlogStatus::Draft, BlogStatus::Published, BlogStatus::Archived];

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.to_string() == raw)
    }
}

impl fmt::Display for BlogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlogStatus::Draft => write!(f, "draft"),
            BlogStatus::Published => write!(f, "published"),
            BlogStatus::Archived => write!(f, "archived"),
        }
    }
}

/// Admin actions on a blog's publication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishAction {
    Publish,
    Unpublish,
    Archive,
}

impl PublishAction {
    pub fn target(&self) -> BlogStatus {
        match self {
            PublishAction::Publish => BlogStatus::Published,
            PublishAction::Unpublish => BlogStatus::Draft,
            PublishAction::Archive => BlogStatus::Archived,
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            PublishAction::Publish => "Blog published successfully",
            PublishAction::Unpublish => "Blog unpublished successfully",
            PublishAction::Archive => "Blog archived successfully",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlogAuthor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blog {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub featured_image: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    pub status: BlogStatus,
    pub views: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author: Option<BlogAuthor>,
}

/// Whitespace-separated words of `content` with markup removed.
fn word_count(content: &str) -> usize {
    let mut text = String::with_capacity(content.len());
    let mut in_tag = false;
    for c in content.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.split_whitespace()
        .filter(|word| word.chars().any(char::is_alphabetic))
        .count()
}

/// "Less than 1 min", "1 min read", "4 mins read" at 200 words per minute.
pub fn reading_time(content: &str) -> String {
    let minutes = word_count(content).div_ceil(WORDS_PER_MINUTE);
    match minutes {
        0 => "Less than 1 min".to_string(),
        1 => "1 min read".to_string(),
        n => format!("{} mins read", n),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BlogResource {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub featured_image: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub status: BlogStatus,
    pub views: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<BlogAuthor>,
    pub published_at: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub reading_time: String,
}

impl From<Blog> for BlogResource {
    fn from(b: Blog) -> Self {
        let reading_time = reading_time(&b.content);
        Self {
            id: b.id,
            title: b.title,
            slug: b.slug,
            excerpt: b.excerpt,
            content: b.content,
            featured_image: b.featured_image,
            category: b.category,
            tags: b.tags.unwrap_or_default(),
            status: b.status,
            views: b.views,
            author: b.author,
            published_at: format_timestamp(b.published_at),
            created_at: format_timestamp(b.created_at),
            updated_at: format_timestamp(b.updated_at),
            reading_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ViewedBlog {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub views: i64,
    pub author: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecentBlog {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub published_at: Option<String>,
    pub author: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BlogStatistics {
    pub total: u64,
    pub published: u64,
    pub draft: u64,
    pub archived: u64,
    pub total_views: i64,
    pub average_views: f64,
    pub most_viewed: Vec<ViewedBlog>,
    pub recent_published: Vec<RecentBlog>,
    pub categories: Vec<CategoryCount>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBlogRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub featured_image: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<String>,
    pub published_at: Option<String>,
}

/// Partial update. Absent fields are untouched; an empty string clears a nullable column.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBlogRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub featured_image: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<String>,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlogListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub author_id: Option<String>,
    pub search: Option<String>,
    pub tag: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublicBlogQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub author_id: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BlogError {
    #[error("Blog not found")]
    NotFound,

    #[error("A blog with this title already exists")]
    TitleTaken,

    #[error("This slug is already in use")]
    SlugTaken,

    #[error("Blog is already published")]
    AlreadyPublished,

    #[error("Blog is already a draft")]
    AlreadyDraft,

    #[error("Blog is already archived")]
    AlreadyArchived,

    #[error("Blog was modified by another request. Please retry.")]
    ConcurrentModification,

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl BlogError {
    pub fn already(status: BlogStatus) -> Self {
        match status {
            BlogStatus::Published => BlogError::AlreadyPublished,
            BlogStatus::Draft => BlogError::AlreadyDraft,
            BlogStatus::Archived => BlogError::AlreadyArchived,
        }
    }
}

impl From<BlogError> for AppError {
    fn from(err: BlogError) -> Self {
        match err {
            BlogError::NotFound => AppError::NotFound(err.to_string()),
            BlogError::TitleTaken | BlogError::SlugTaken | BlogError::ConcurrentModification => {
                AppError::Conflict(err.to_string())
            }
            BlogError::AlreadyPublished | BlogError::AlreadyDraft | BlogError::AlreadyArchived => {
                AppError::State(err.to_string())
            }
            BlogError::Validation(errors) => AppError::Validation(errors),
            BlogError::Database(e) => e.into(),
        }
    }
}
