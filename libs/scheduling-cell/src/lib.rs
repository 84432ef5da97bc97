pub mod error;
pub mod models;
pub mod services;
pub mod store;

// Re-export models and services for the booking flow
pub use error::{Result, SchedulingError};
pub use models::*;
pub use services::*;
pub use store::{InMemorySchedulingStore, SchedulingStore};
