pub mod blog;
pub mod publishing;
pub mod reader;

pub use blog::BlogService;
pub use publishing::BlogPublishingService;
pub use reader::BlogReaderService;
