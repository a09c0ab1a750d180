use std::sync::Arc;

use axum::{
    extract::{Extension, Json, State},
};
use serde_json::Value;
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::AuthenticatedUser;
use shared_models::error::AppError;
use shared_models::response::{message_only, success};

use crate::models::{LoginRequest, LoginResponse, LoginUser, ProfileResponse, TokenResponse};
use crate::services::AuthService;

#[axum::debug_handler]
pub async fn login(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let auth_service = AuthService::new(&state);
    let (user, token) = auth_service.login(request).await?;

    Ok(success(
        LoginResponse {
            user: LoginUser::from(&user),
            token,
            token_type: "Bearer",
        },
        "Login successful",
    ))
}

#[axum::debug_handler]
pub async fn logout(
    State(state): State<Arc<AppConfig>>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<Value>, AppError> {
    AuthService::new(&state).logout(&auth).await?;
    Ok(message_only("Logout successful"))
}

#[axum::debug_handler]
pub async fn logout_all(
    State(state): State<Arc<AppConfig>>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<Value>, AppError> {
    AuthService::new(&state).logout_all(&auth).await?;
    Ok(message_only("Logged out from all devices successfully"))
}

#[axum::debug_handler]
pub async fn me(Extension(auth): Extension<AuthenticatedUser>) -> Result<Json<Value>, AppError> {
    debug!("Profile requested by {}", auth.user.id);
    Ok(success(ProfileResponse::from(auth.user), "User retrieved successfully"))
}

#[axum::debug_handler]
pub async fn refresh(
    State(state): State<Arc<AppConfig>>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<Value>, AppError> {
    let token = AuthService::new(&state).refresh(&auth).await?;
    Ok(success(
        TokenResponse {
            token,
            token_type: "Bearer",
        },
        "Token refreshed successfully",
    ))
}
