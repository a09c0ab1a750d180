use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};

use crate::token::{generate_token, hash_token};

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub access_token_ttl_hours: Option<i64>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_service_key: "test-service-role-key".to_string(),
            access_token_ttl_hours: None,
        }
    }
}

impl TestConfig {
    /// Points the config at a mock PostgREST, usually `MockServer::uri()`.
    pub fn with_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_service_key: self.supabase_service_key.clone(),
            server_host: "127.0.0.1".to_string(),
            server_port: 3000,
            access_token_ttl_hours: self.access_token_ttl_hours,
            cors_allowed_origins: Vec::new(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: "Test User".to_string(),
            email: email.to_string(),
            role,
            is_active: true,
        }
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, Role::Admin)
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, Role::Doctor)
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            phone: None,
            address: None,
            profile_image: None,
            is_active: self.is_active,
            password: None,
            created_at: Some(Utc::now()),
        }
    }

    /// `users` row as PostgREST returns it, including a password hash when given.
    pub fn to_row(&self, password_hash: Option<&str>) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "email": self.email,
            "role": self.role.to_string(),
            "phone": null,
            "address": null,
            "profile_image": null,
            "is_active": self.is_active,
            "password": password_hash,
            "created_at": "2025-01-01T00:00:00Z"
        })
    }
}

/// An issued token: the secret a client sends and the row stored for it.
pub struct TestToken {
    pub id: Uuid,
    pub secret: String,
    pub digest: String,
}

impl TestToken {
    pub fn issue() -> Self {
        let secret = generate_token();
        Self {
            id: Uuid::new_v4(),
            digest: hash_token(&secret),
            secret,
        }
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.secret)
    }

    pub fn to_row(&self, user_id: Uuid, expires_at: Option<DateTime<Utc>>) -> Value {
        json!({
            "id": self.id,
            "user_id": user_id,
            "name": "admin-token",
            "token": self.digest,
            "abilities": ["admin"],
            "last_used_at": null,
            "expires_at": expires_at,
            "created_at": "2025-01-01T00:00:00Z"
        })
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn doctor_row(id: Uuid, name: &str, is_active: bool) -> Value {
        json!({
            "id": id,
            "name": name,
            "email": format!("{}@clinic.test", name.to_lowercase().replace(' ', ".")),
            "role": "doctor",
            "phone": "+15550100",
            "address": null,
            "bio": "General practitioner",
            "specialization": "Cardiology",
            "license_number": "LIC-1001",
            "years_of_experience": 7,
            "consultation_fee": 150.0,
            "profile_image": null,
            "is_active": is_active,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn service_row(id: Uuid, name: &str, slug: &str, is_active: bool) -> Value {
        json!({
            "id": id,
            "name": name,
            "slug": slug,
            "description": "Full consultation",
            "short_description": null,
            "price": 120.0,
            "duration": 90,
            "icon": null,
            "image": null,
            "is_active": is_active,
            "display_order": 0,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn appointment_row(id: Uuid, doctor_id: Uuid, status: &str, confirmed_at: Option<&str>) -> Value {
        json!({
            "id": id,
            "doctor_id": doctor_id,
            "service_id": null,
            "patient_name": "Jane Patient",
            "patient_email": "jane@example.com",
            "patient_phone": "+15550111",
            "message": null,
            "preferred_date": "2025-06-10",
            "preferred_time": "10:00:00",
            "status": status,
            "admin_notes": null,
            "confirmed_at": confirmed_at,
            "created_at": "2025-06-01T08:00:00Z",
            "updated_at": "2025-06-01T08:00:00Z",
            "doctor": {
                "id": doctor_id,
                "name": "Dr. Who",
                "specialization": "Cardiology",
                "email": "who@clinic.test",
                "phone": "+15550100"
            },
            "service": null
        })
    }

    pub fn blog_row(id: Uuid, author_id: Uuid, title: &str, slug: &str, status: &str) -> Value {
        let published_at = (status == "published").then_some("2025-05-01T09:00:00Z");
        json!({
            "id": id,
            "author_id": author_id,
            "title": title,
            "slug": slug,
            "excerpt": null,
            "content": "Some words about health.",
            "featured_image": null,
            "category": "Wellness",
            "tags": ["health"],
            "status": status,
            "views": 0,
            "published_at": published_at,
            "created_at": "2025-05-01T08:00:00Z",
            "updated_at": "2025-05-01T08:00:00Z",
            "author": { "id": author_id, "name": "Admin", "email": "admin@clinic.test" }
        })
    }

    /// PostgREST error body for a Postgres SQLSTATE.
    pub fn error_response(code: &str, message: &str) -> Value {
        json!({
            "code": code,
            "details": null,
            "hint": null,
            "message": message
        })
    }
}
