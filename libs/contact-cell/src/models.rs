use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use shared_models::error::AppError;
use shared_utils::validation::{present, Validator};

// ==============================================================================
// CONTACT FORM
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

/// A submission that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactMessage<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub subject: &'a str,
    pub message: &'a str,
}

impl ContactRequest {
    pub fn validate(&self) -> Result<ContactMessage<'_>, AppError> {
        let mut v = Validator::new();

        let name = v.required("name", self.name.as_deref(), "The name field is required.");
        v.max_length("name", name, 255, "The name field must not be greater than 255 characters.");

        let email = v.required("email", self.email.as_deref(), "The email field is required.");
        v.email("email", email, "The email field must be a valid email address.");
        v.max_length("email", email, 255, "The email field must not be greater than 255 characters.");

        let phone = present(self.phone.as_deref());
        v.max_length("phone", phone, 20, "The phone field must not be greater than 20 characters.");

        let subject = v.required("subject", self.subject.as_deref(), "The subject field is required.");
        v.max_length("subject", subject, 255, "The subject field must not be greater than 255 characters.");

        let message = v.required("message", self.message.as_deref(), "The message field is required.");
        v.max_length("message", message, 2000, "The message field must not be greater than 2000 characters.");

        v.finish()?;
        match (name, email, subject, message) {
            (Some(name), Some(email), Some(subject), Some(message)) => Ok(ContactMessage {
                name,
                email,
                phone,
                subject,
                message,
            }),
            _ => Err(AppError::Internal("contact validation passed with missing fields".to_string())),
        }
    }
}

/// `CNT-` followed by the first eight hex digits of a digest over the sender and time.
pub fn reference_id(email: &str, at: DateTime<Utc>) -> String {
    let digest = Sha256::digest(format!("{}{}", email, at.to_rfc3339()).as_bytes());
    let hex: String = digest.iter().take(4).map(|b| format!("{:02X}", b)).collect();
    format!("CNT-{}", hex)
}

#[derive(Debug, Clone, Serialize)]
pub struct ContactReceipt {
    pub submitted_at: String,
    pub reference_id: String,
}

impl ContactReceipt {
    pub fn issue(email: &str, at: DateTime<Utc>) -> Self {
        Self {
            submitted_at: at.format("%Y-%m-%d %H:%M:%S").to_string(),
            reference_id: reference_id(email, at),
        }
    }
}

// ==============================================================================
// CLINIC DETAILS
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct WorkingHours {
    pub monday_friday: &'static str,
    pub saturday: &'static str,
    pub sunday: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SocialMedia {
    pub facebook: &'static str,
    pub twitter: &'static str,
    pub instagram: &'static str,
    pub linkedin: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContactInfo {
    pub email: &'static str,
    pub phone: &'static str,
    pub address: &'static str,
    pub working_hours: WorkingHours,
    pub emergency: &'static str,
    pub social_media: SocialMedia,
}

pub const CLINIC_CONTACT: ContactInfo = ContactInfo {
    email: "info@doctorappointment.com",
    phone: "+1 (555) 123-4567",
    address: "123 Medical Center Drive, Healthcare City, HC 12345",
    working_hours: WorkingHours {
        monday_friday: "9:00 AM - 6:00 PM",
        saturday: "10:00 AM - 4:00 PM",
        sunday: "Closed",
    },
    emergency: "+1 (555) 911-HELP",
    social_media: SocialMedia {
        facebook: "https://facebook.com/doctorappointment",
        twitter: "https://twitter.com/doctorappointment",
        instagram: "https://instagram.com/doctorappointment",
        linkedin: "https://linkedin.com/company/doctorappointment",
    },
};
