// Core infrastructure modules
pub mod config;
pub mod core;

// Mapping engine modules
pub mod mapper;
pub mod reader;
pub mod schema;
pub mod sql;
pub mod writer;

#[doc(hidden)]
pub mod test_utils;

pub use crate::config::{Config, DatabaseConfig, LoggingConfig};
pub use crate::core::db::connection::{Database, TransactionState};
pub use crate::core::{OrmError, Result};
pub use crate::mapper::TableMapper;
pub use crate::reader::{Query, Reader};
pub use crate::schema::types::{
    Column, ColumnMut, ExternalSlot, Field, OptionalSlot, Shadowed, Slot, SqlType, SqlValue, Value,
};
pub use crate::schema::{
    Children, DateShadow, Entity, EntityKind, FieldSchema, ForeignKeyConstraint, Record,
    TableSchema, VectorSchema,
};
pub use crate::writer::{Operation, UpdateMode, Writer};

// Paths used by the declaration macros
#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::Lazy;
    pub use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
}
