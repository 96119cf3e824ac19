//! Shared error taxonomy and small value types used across nodekeeper crates.

pub mod error;
pub mod types;

pub use error::AppError;
pub use types::ReadinessCondition;
