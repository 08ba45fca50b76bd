/// sqlorm Error Module
///
/// This module defines the error taxonomy shared by the connection manager,
/// the statement builder, the writer and the reader. Every failure is
/// reported as a value; nothing in the mapping engine panics or retries.
use thiserror::Error;

/// Comprehensive error type for the mapping engine.
///
/// This enum covers all error scenarios that can occur while mapping:
/// - Connection lifecycle (not connected, transaction misuse)
/// - Statement lifecycle (prepare, bind, step, fetch, finalize)
/// - Batch validation (empty batches, mismatched update slices)
/// - Schema and value conversion problems
#[derive(Error, Debug)]
pub enum OrmError {
    /// Database-related errors from SQLite operations
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// An operation needed a live connection but none was open
    #[error("Not connected to a database")]
    NotConnected,

    /// A writer or reader was prepared twice without finalizing
    #[error("Statement on table {table} is already prepared for {operation}")]
    AlreadyPrepared { table: String, operation: String },

    /// A writer or reader was used for an operation it was not prepared for
    #[error("No statement prepared for {operation} on table {table}")]
    NotPrepared { table: String, operation: String },

    /// SQLite rejected the generated statement text
    #[error("Failed to prepare statement `{sql}`: {source}")]
    PrepareFailed {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A value could not be bound to its placeholder
    #[error("Failed to bind parameter {index}: {source}")]
    BindFailed {
        index: usize,
        #[source]
        source: rusqlite::Error,
    },

    /// Executing or advancing a statement failed
    #[error("Failed to step statement on table {table}: {source}")]
    StepFailed {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A result column could not be read into its destination field
    #[error("Failed to fetch column {index}: {message}")]
    FetchFailed { index: usize, message: String },

    /// Finalizing a statement failed
    #[error("Failed to finalize statement: {0}")]
    FinalizeFailed(#[source] rusqlite::Error),

    /// A batch operation was given no elements
    #[error("Batch operation on table {0} received no elements")]
    EmptyBatch(String),

    /// Update batches must pair every original with exactly one replacement
    #[error("Size mismatch: {originals} original objects but {updated} updated objects")]
    SizeMismatch { originals: usize, updated: usize },

    /// The first declared field evaluated to NULL
    #[error("Primary key of a {0} row is NULL")]
    NullPrimaryKey(String),

    /// A stored value could not be converted back into its Rust type
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Schema-related errors (invalid identifiers, missing keys, missing parents)
    #[error("Schema error: {0}")]
    Schema(String),

    /// Transaction-related errors
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Result to use OrmError as the error type.
pub type Result<T> = std::result::Result<T, OrmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let db_err = OrmError::Database(rusqlite::Error::ExecuteReturnedResults);
        assert!(db_err.to_string().contains("Database error"));

        let prepared = OrmError::AlreadyPrepared {
            table: "point".to_string(),
            operation: "Insert".to_string(),
        };
        assert_eq!(
            prepared.to_string(),
            "Statement on table point is already prepared for Insert"
        );

        let mismatch = OrmError::SizeMismatch { originals: 2, updated: 3 };
        assert!(mismatch.to_string().contains("2 original objects"));
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let orm_err: OrmError = io_err.into();
        match orm_err {
            OrmError::Io(_) => {}
            _ => panic!("Expected IO error"),
        }

        let sqlite_err: OrmError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(sqlite_err, OrmError::Database(_)));
    }
}
