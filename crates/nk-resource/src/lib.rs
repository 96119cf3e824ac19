//! Scoped resource ownership with LIFO release.

pub mod scope;

pub use scope::{ResourceScope, ScopedResource};
