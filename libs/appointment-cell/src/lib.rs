pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use router::{appointment_admin_routes, appointment_public_routes};
