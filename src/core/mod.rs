/// Core Module for sqlorm
///
/// This module contains the infrastructure the mapping engine is built on:
/// the connection context, the statement cursor layer, catalog
/// introspection and the shared error type.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{OrmError, Result};
