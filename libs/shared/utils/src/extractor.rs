use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_database::{ListQuery, SupabaseClient};
use shared_models::auth::{AccessToken, AuthenticatedUser, User};
use shared_models::error::AppError;

use crate::token::{bearer_token, hash_token};

pub const UNAUTHENTICATED: &str = "Unauthenticated";
pub const ADMIN_ONLY: &str = "Unauthorized. Admin access only.";
pub const ACCOUNT_INACTIVE: &str = "Account is inactive. Please contact support.";

/// Rejects anything but an active admin holding a live token, then exposes the
/// caller as an `AuthenticatedUser` extension.
pub async fn admin_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| AppError::Auth(UNAUTHENTICATED.to_string()))?;

    let client = SupabaseClient::new(&config);
    let (access_token, user) = resolve_token(&client, token).await?;
    ensure_active_admin(&user)?;

    touch_last_used(&client, &access_token).await;

    debug!("Admin {} authenticated with token {}", user.id, access_token.id);
    request.extensions_mut().insert(AuthenticatedUser {
        user,
        token_id: access_token.id,
    });

    Ok(next.run(request).await)
}

/// Looks a bearer secret up by digest; unknown, expired or orphaned tokens are all 401.
pub async fn resolve_token(
    client: &SupabaseClient,
    token: &str,
) -> Result<(AccessToken, User), AppError> {
    let path = ListQuery::table("personal_access_tokens")
        .eq("token", hash_token(token))
        .limit(1)
        .to_path();

    let access_token: AccessToken = client
        .select_one(&path)
        .await?
        .ok_or_else(|| AppError::Auth(UNAUTHENTICATED.to_string()))?;

    if access_token.is_expired(Utc::now()) {
        debug!("Token {} has expired", access_token.id);
        return Err(AppError::Auth(UNAUTHENTICATED.to_string()));
    }

    let user_path = ListQuery::table("users")
        .eq("id", access_token.user_id)
        .limit(1)
        .to_path();

    let user: User = client
        .select_one(&user_path)
        .await?
        .ok_or_else(|| AppError::Auth(UNAUTHENTICATED.to_string()))?;

    Ok((access_token, user))
}

/// Role gate shared by login and the middleware: admin role first, then active status.
pub fn ensure_active_admin(user: &User) -> Result<(), AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(ADMIN_ONLY.to_string()));
    }
    if !user.is_active {
        return Err(AppError::Forbidden(ACCOUNT_INACTIVE.to_string()));
    }
    Ok(())
}

async fn touch_last_used(client: &SupabaseClient, token: &AccessToken) {
    let path = ListQuery::table("personal_access_tokens")
        .eq("id", token.id)
        .to_path();

    if let Err(e) = client
        .update::<serde_json::Value>(&path, json!({ "last_used_at": Utc::now() }))
        .await
    {
        warn!("Could not record token usage for {}: {}", token.id, e);
    }
}
