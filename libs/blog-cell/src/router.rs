use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::admin_middleware;

use crate::handlers;

/// Mounted under `/v1/admin/blogs`.
pub fn blog_admin_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_blogs).post(handlers::create_blog))
        .route("/statistics", get(handlers::blog_statistics))
        .route("/categories", get(handlers::admin_categories))
        .route("/tags", get(handlers::admin_tags))
        .route(
            "/{blog_id}",
            get(handlers::get_blog)
                .put(handlers::update_blog)
                .delete(handlers::delete_blog),
        )
        .route("/{blog_id}/publish", post(handlers::publish_blog))
        .route("/{blog_id}/unpublish", post(handlers::unpublish_blog))
        .route("/{blog_id}/archive", post(handlers::archive_blog))
        .layer(middleware::from_fn_with_state(state.clone(), admin_middleware))
        .with_state(state)
}

/// Mounted under `/v1/blogs`.
pub fn blog_public_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::public_blogs))
        .route("/featured", get(handlers::featured_blogs))
        .route("/categories", get(handlers::public_categories))
        .route("/tags", get(handlers::public_tags))
        .route("/{slug}", get(handlers::public_blog))
        .route("/{slug}/related", get(handlers::related_blogs))
        .with_state(state)
}
