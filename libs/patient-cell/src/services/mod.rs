pub mod credits;
pub mod patient;

pub use credits::{CreditAdjustment, CreditService};
pub use patient::PatientService;
