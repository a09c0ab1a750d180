pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use router::{doctor_admin_routes, doctor_public_routes};
