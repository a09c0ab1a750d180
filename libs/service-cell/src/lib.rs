pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use router::{service_admin_routes, service_public_routes};
