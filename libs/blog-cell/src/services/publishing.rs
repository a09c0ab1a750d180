use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{ListQuery, SupabaseClient};

use crate::models::{Blog, BlogError, BlogStatus, PublishAction, BLOG_SELECT};
use crate::services::blog::{duplicate, find_blog};

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` or a bare date (midnight UTC).
pub fn parse_published_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Columns written when a blog moves to `target`.
///
/// `published_at` is non-null exactly while the blog is published.
pub fn status_changes(
    target: BlogStatus,
    requested_published_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Map<String, Value> {
    let mut changes = Map::new();
    changes.insert("status".to_string(), json!(target));
    let published_at = match target {
        BlogStatus::Published => Some(requested_published_at.unwrap_or(now)),
        BlogStatus::Draft | BlogStatus::Archived => None,
    };
    changes.insert("published_at".to_string(), json!(published_at));
    changes
}

/// Writes `changes` only if the blog still carries the status it was read with.
pub(crate) async fn guarded_update(
    client: &SupabaseClient,
    current: &Blog,
    mut changes: Map<String, Value>,
) -> Result<Blog, BlogError> {
    changes.insert("updated_at".to_string(), json!(Utc::now()));

    let path = ListQuery::table("blogs")
        .select(BLOG_SELECT)
        .eq("id", current.id)
        .eq("status", current.status)
        .to_path();

    let rows: Vec<Blog> = client
        .update(&path, Value::Object(changes))
        .await
        .map_err(duplicate)?;

    rows.into_iter().next().ok_or(BlogError::ConcurrentModification)
}

pub struct BlogPublishingService {
    supabase: SupabaseClient,
}

impl BlogPublishingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn apply(&self, blog_id: Uuid, action: PublishAction) -> Result<Blog, BlogError> {
        let current = find_blog(&self.supabase, blog_id).await?;
        let target = action.target();
        if current.status == target {
            warn!("Blog {} is already {}", blog_id, target);
            return Err(BlogError::already(target));
        }

        let changes = status_changes(target, None, Utc::now());
        let updated = guarded_update(&self.supabase, &current, changes).await?;
        info!("Blog {} moved {} -> {}", blog_id, current.status, updated.status);
        Ok(updated)
    }
}
