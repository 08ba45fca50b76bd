/// Database Module
///
/// This module provides the database layer the mapper drives,
/// organized into focused submodules.
///
/// ## Architecture
///
/// - **Connection Management** (`connection.rs`): the `Database` context object, pragmas and transactions
/// - **Statement Backend** (`backend.rs`): bind and fetch cursors over prepared statements
/// - **Catalog Introspection** (`catalog.rs`): metadata about the tables the mapper created
///
/// ## Error Handling
///
/// All database operations use the standardized `OrmError` type for consistent error propagation.
pub mod backend;
pub mod catalog;
pub mod connection;

pub use backend::*;
pub use catalog::*;
pub use connection::*;
