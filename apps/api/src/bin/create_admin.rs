//! Seeds an administrator account.
//!
//! ```text
//! ADMIN_PASSWORD=... create-admin <email> [name]
//! ```

use anyhow::{bail, Context};
use dotenv::dotenv;
use serde_json::{json, Value};
use tracing::info;

use shared_config::AppConfig;
use shared_database::{ListQuery, SupabaseClient};
use shared_utils::password::hash_password;
use shared_utils::validation::is_valid_email;

const MIN_PASSWORD_LENGTH: usize = 6;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let email = args.next().context("usage: create-admin <email> [name]")?;
    let name = args.next().unwrap_or_else(|| "Administrator".to_string());
    let password = std::env::var("ADMIN_PASSWORD").context("ADMIN_PASSWORD must be set")?;

    if !is_valid_email(&email) {
        bail!("'{}' is not a valid email address", email);
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        bail!("ADMIN_PASSWORD must be at least {} characters", MIN_PASSWORD_LENGTH);
    }

    let config = AppConfig::from_env();
    if !config.is_configured() {
        bail!("SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY must be set");
    }
    let client = SupabaseClient::new(&config);

    let existing = ListQuery::table("users").select("id").eq("email", &email).to_path();
    if client.count(&existing).await? > 0 {
        bail!("a user with email {} already exists", email);
    }

    let row = json!({
        "name": name,
        "email": email,
        "password": hash_password(&password)?,
        "role": "admin",
        "is_active": true,
    });
    let path = ListQuery::table("users").select("id,email").to_path();
    let created: Value = client.insert(&path, row).await?;

    info!("Admin {} created with id {}", email, created["id"]);
    Ok(())
}
