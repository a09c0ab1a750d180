pub mod directory;
pub mod doctor;

pub use directory::DoctorDirectoryService;
pub use doctor::DoctorService;
