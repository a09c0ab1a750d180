pub mod catalog;
pub mod service;

pub use catalog::ServiceCatalogService;
pub use service::ServiceService;
