use axum::{http::StatusCode, Json};
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::UserAgent;
use serde_json::Value;
use tracing::info;

use shared_models::error::AppError;
use shared_models::response::{created, success};

use crate::models::{ContactReceipt, ContactRequest, CLINIC_CONTACT};

#[axum::debug_handler]
pub async fn submit_contact(
    user_agent: Option<TypedHeader<UserAgent>>,
    Json(request): Json<ContactRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let contact = request.validate()?;
    let now = Utc::now();
    let receipt = ContactReceipt::issue(contact.email, now);

    info!(
        reference_id = %receipt.reference_id,
        name = contact.name,
        email = contact.email,
        phone = contact.phone,
        subject = contact.subject,
        message = contact.message,
        user_agent = user_agent.as_ref().map(|TypedHeader(ua)| ua.as_str()),
        "Contact form submission"
    );

    Ok(created(
        receipt,
        "Thank you for contacting us. We will get back to you shortly.",
    ))
}

#[axum::debug_handler]
pub async fn contact_info() -> Json<Value> {
    success(CLINIC_CONTACT, "Contact information retrieved successfully")
}
