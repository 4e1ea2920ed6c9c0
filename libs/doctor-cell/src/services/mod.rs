pub mod application;
pub mod availability;
pub mod doctor;

pub use application::ApplicationService;
pub use availability::{AvailabilityService, CONSULTATION_MINUTES};
pub use doctor::DoctorService;
