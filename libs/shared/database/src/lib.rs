pub mod rest;

pub use rest::{eq, DatabaseClient, DatabaseError};
