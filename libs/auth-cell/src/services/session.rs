use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{ListQuery, SupabaseClient};
use shared_models::auth::{AuthenticatedUser, User};
use shared_models::error::AppError;
use shared_utils::extractor::{ensure_active_admin, UNAUTHENTICATED};
use shared_utils::password::verify_password;
use shared_utils::token::{generate_token, hash_token};
use shared_utils::validation::Validator;

use crate::models::LoginRequest;

const TOKEN_NAME: &str = "admin-token";
const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub struct AuthService {
    supabase: SupabaseClient,
    token_ttl_hours: Option<i64>,
}

impl AuthService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            token_ttl_hours: config.access_token_ttl_hours,
        }
    }

    /// Checks credentials and the admin gate, then issues a token.
    pub async fn login(&self, request: LoginRequest) -> Result<(User, String), AppError> {
        let mut v = Validator::new();
        let email = v.required("email", request.email.as_deref(), "The email field is required.");
        v.email("email", email, "The email must be a valid email address.");
        let password = v.required("password", request.password.as_deref(), "The password field is required.");
        v.min_length("password", password, 6, "The password must be at least 6 characters.");

        let errors = v.into_errors();
        let (email, password) = match (email, password) {
            (Some(email), Some(password)) if errors.is_empty() => (email, password),
            _ => return Err(AppError::Validation(errors)),
        };

        debug!("Login attempt for {}", email);

        let path = ListQuery::table("users").eq("email", email).limit(1).to_path();
        let user: User = self
            .supabase
            .select_one(&path)
            .await?
            .ok_or_else(|| AppError::Auth(INVALID_CREDENTIALS.to_string()))?;

        ensure_active_admin(&user)?;

        let hash = user.password.as_deref().unwrap_or_default();
        if hash.is_empty() || !verify_password(password, hash)? {
            warn!("Failed login for {}", email);
            return Err(AppError::Auth(INVALID_CREDENTIALS.to_string()));
        }

        let token = self.issue_token(user.id).await?;
        info!("Admin {} logged in", user.id);

        Ok((user, token))
    }

    fn expiry(&self) -> Option<DateTime<Utc>> {
        self.token_ttl_hours
            .map(|hours| Utc::now() + Duration::hours(hours))
    }

    /// Stores the digest of a fresh secret and returns the secret.
    pub async fn issue_token(&self, user_id: Uuid) -> Result<String, AppError> {
        let token = generate_token();
        let expires_at = self.expiry();

        let _: Value = self
            .supabase
            .insert(
                "/rest/v1/personal_access_tokens",
                json!({
                    "user_id": user_id,
                    "name": TOKEN_NAME,
                    "token": hash_token(&token),
                    "abilities": ["admin"],
                    "expires_at": expires_at,
                }),
            )
            .await?;

        Ok(token)
    }

    pub async fn logout(&self, auth: &AuthenticatedUser) -> Result<(), AppError> {
        let path = ListQuery::table("personal_access_tokens")
            .eq("id", auth.token_id)
            .to_path();
        self.supabase.delete(&path).await?;
        info!("Token {} revoked", auth.token_id);
        Ok(())
    }

    pub async fn logout_all(&self, auth: &AuthenticatedUser) -> Result<usize, AppError> {
        let path = ListQuery::table("personal_access_tokens")
            .eq("user_id", auth.user.id)
            .to_path();
        let removed = self.supabase.delete(&path).await?;
        info!("Revoked {} tokens for {}", removed, auth.user.id);
        Ok(removed)
    }

    /// Swaps the presented token for a new one in a single statement; on failure the old
    /// token stays valid.
    pub async fn refresh(&self, auth: &AuthenticatedUser) -> Result<String, AppError> {
        let token = generate_token();
        let rotated: Option<Uuid> = self
            .supabase
            .rpc(
                "rotate_access_token",
                json!({
                    "old_token_id": auth.token_id,
                    "new_token": hash_token(&token),
                    "new_expires_at": self.expiry(),
                }),
            )
            .await?;

        // null when the old token was revoked concurrently
        let new_id = rotated.ok_or_else(|| AppError::Auth(UNAUTHENTICATED.to_string()))?;
        info!("Token {} rotated to {}", auth.token_id, new_id);
        Ok(token)
    }
}
