pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use router::{blog_admin_routes, blog_public_routes};
