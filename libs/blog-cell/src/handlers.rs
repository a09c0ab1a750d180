use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::AuthenticatedUser;
use shared_models::error::AppError;
use shared_models::response::{created, message_only, success};

use crate::models::{
    Blog, BlogListQuery, BlogResource, CreateBlogRequest, PublicBlogQuery, PublishAction, UpdateBlogRequest,
};
use crate::services::{BlogPublishingService, BlogReaderService, BlogService};

fn resources(blogs: Vec<Blog>) -> Vec<BlogResource> {
    blogs.into_iter().map(BlogResource::from).collect()
}

// ==============================================================================
// ADMIN HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_blogs(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<BlogListQuery>,
) -> Result<Json<Value>, AppError> {
    let page = BlogService::new(&state).list(query).await?;
    Ok(success(
        page.map(BlogResource::from).into_json("blogs"),
        "Blogs retrieved successfully",
    ))
}

#[axum::debug_handler]
pub async fn create_blog(
    State(state): State<Arc<AppConfig>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(request): Json<CreateBlogRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let blog = BlogService::new(&state).create(auth.user.id, request).await?;
    Ok(created(BlogResource::from(blog), "Blog created successfully"))
}

#[axum::debug_handler]
pub async fn get_blog(
    State(state): State<Arc<AppConfig>>,
    Path(blog_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let blog = BlogService::new(&state).get(blog_id).await?;
    Ok(success(BlogResource::from(blog), "Blog retrieved successfully"))
}

#[axum::debug_handler]
pub async fn update_blog(
    State(state): State<Arc<AppConfig>>,
    Path(blog_id): Path<Uuid>,
    Json(request): Json<UpdateBlogRequest>,
) -> Result<Json<Value>, AppError> {
    let blog = BlogService::new(&state).update(blog_id, request).await?;
    Ok(success(BlogResource::from(blog), "Blog updated successfully"))
}

#[axum::debug_handler]
pub async fn delete_blog(
    State(state): State<Arc<AppConfig>>,
    Path(blog_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    BlogService::new(&state).delete(blog_id).await?;
    Ok(message_only("Blog deleted successfully"))
}

async fn run_publishing(state: &AppConfig, blog_id: Uuid, action: PublishAction) -> Result<Json<Value>, AppError> {
    let blog = BlogPublishingService::new(state).apply(blog_id, action).await?;
    Ok(success(BlogResource::from(blog), action.success_message()))
}

#[axum::debug_handler]
pub async fn publish_blog(
    State(state): State<Arc<AppConfig>>,
    Path(blog_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    run_publishing(&state, blog_id, PublishAction::Publish).await
}

#[axum::debug_handler]
pub async fn unpublish_blog(
    State(state): State<Arc<AppConfig>>,
    Path(blog_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    run_publishing(&state, blog_id, PublishAction::Unpublish).await
}

#[axum::debug_handler]
pub async fn archive_blog(
    State(state): State<Arc<AppConfig>>,
    Path(blog_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    run_publishing(&state, blog_id, PublishAction::Archive).await
}

#[axum::debug_handler]
pub async fn blog_statistics(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let stats = BlogService::new(&state).statistics().await?;
    Ok(success(stats, "Statistics retrieved successfully"))
}

#[axum::debug_handler]
pub async fn admin_categories(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let categories = BlogService::new(&state).categories().await?;
    Ok(success(json!({ "categories": categories }), "Categories retrieved successfully"))
}

#[axum::debug_handler]
pub async fn admin_tags(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let tags = BlogService::new(&state).tags().await?;
    Ok(success(json!({ "tags": tags }), "Tags retrieved successfully"))
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn public_blogs(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<PublicBlogQuery>,
) -> Result<Json<Value>, AppError> {
    let page = BlogReaderService::new(&state).list(query).await?;
    Ok(success(
        page.map(BlogResource::from).into_json("blogs"),
        "Blogs retrieved successfully",
    ))
}

#[axum::debug_handler]
pub async fn featured_blogs(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let blogs = BlogReaderService::new(&state).featured().await?;
    Ok(success(resources(blogs), "Featured blogs retrieved successfully"))
}

#[axum::debug_handler]
pub async fn public_categories(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let categories = BlogReaderService::new(&state).categories().await?;
    Ok(success(categories, "Categories retrieved successfully"))
}

#[axum::debug_handler]
pub async fn public_tags(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let tags = BlogReaderService::new(&state).tags().await?;
    Ok(success(tags, "Tags retrieved successfully"))
}

#[axum::debug_handler]
pub async fn public_blog(
    State(state): State<Arc<AppConfig>>,
    Path(slug): Path<String>,
) -> Result<Json<Value>, AppError> {
    let blog = BlogReaderService::new(&state).show(&slug).await?;
    Ok(success(BlogResource::from(blog), "Blog retrieved successfully"))
}

#[axum::debug_handler]
pub async fn related_blogs(
    State(state): State<Arc<AppConfig>>,
    Path(slug): Path<String>,
) -> Result<Json<Value>, AppError> {
    let blogs = BlogReaderService::new(&state).related(&slug).await?;
    Ok(success(resources(blogs), "Related blogs retrieved successfully"))
}
