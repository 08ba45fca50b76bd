//! SQL type mapping and the value visitor.
//!
//! Every type that can sit in a mapped field implements [`Field`] (static
//! classification) and [`Value`] (runtime read/write views). A type without
//! a `Field` impl cannot be declared in a mapped record, so an unmapped type
//! is rejected by the compiler instead of falling back at runtime.

use crate::core::Result;
use crate::schema::{Entity, Record, TableSchema};
use rusqlite::types::{FromSql, FromSqlResult, ValueRef};
use std::fmt;

pub use rusqlite::types::Value as SqlValue;

/// Storage classification of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Text,
    Boolean,
    /// A mapped record flattened into the parent row
    Composite,
    /// A type stored through its shadow projection
    External,
    /// A vector field realized as a child table
    CompositeVector,
    Unknown,
}

impl SqlType {
    /// Column type name used in CREATE TABLE, `None` for non-scalar kinds.
    pub fn sql_name(self) -> Option<&'static str> {
        match self {
            SqlType::TinyInt => Some("TINYINT"),
            SqlType::SmallInt => Some("SMALLINT"),
            SqlType::Integer => Some("INTEGER"),
            SqlType::BigInt => Some("BIGINT"),
            SqlType::Real => Some("REAL"),
            SqlType::Double => Some("DOUBLE"),
            SqlType::Text => Some("TEXT"),
            SqlType::Boolean => Some("BOOLEAN"),
            SqlType::Composite
            | SqlType::External
            | SqlType::CompositeVector
            | SqlType::Unknown => None,
        }
    }

    pub fn is_scalar(self) -> bool {
        self.sql_name().is_some()
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sql_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:?}", self),
        }
    }
}

/// Static classification of a field type.
pub trait Field: Value + Default + 'static {
    const SQL_TYPE: SqlType;
    /// Whether the declared storage is optional.
    const NULLABLE: bool = false;

    /// Nested schema of a Composite or External type.
    fn nested() -> Option<&'static TableSchema> {
        None
    }
}

/// Read view of one field, produced for binding.
pub enum Column<'a> {
    /// An empty optional
    Null,
    Scalar(SqlValue),
    Composite(&'a dyn Record),
    /// A freshly materialized shadow projection
    External(Box<dyn Record>),
}

/// Write view of one field, produced for fetching.
pub enum ColumnMut<'a> {
    Scalar(&'a mut dyn Slot),
    Optional(&'a mut dyn OptionalSlot),
    Composite(&'a mut dyn Record),
    External(&'a mut dyn ExternalSlot),
}

/// Runtime accessor shared by every field type.
pub trait Value {
    fn column(&self) -> Column<'_>;
    fn column_mut(&mut self) -> ColumnMut<'_>;
}

/// Destination of a single scalar column.
pub trait Slot {
    fn set(&mut self, value: ValueRef<'_>) -> FromSqlResult<()>;
    /// Called when the column is NULL.
    fn reset(&mut self);
}

/// Optional storage that can be allocated before a fetch and emptied after.
pub trait OptionalSlot {
    /// Allocates a default value if empty and returns it.
    fn ensure(&mut self) -> &mut dyn Value;
    fn clear(&mut self);
}

/// Destination of an External field: fills a transient shadow, then converts.
pub trait ExternalSlot {
    fn with_shadow(
        &mut self,
        visit: &mut dyn FnMut(&mut dyn Record) -> Result<bool>,
    ) -> Result<bool>;
}

/// Explicit conversions between an External type and its shadow record.
pub trait Shadowed: Sized {
    type Shadow: Entity;

    fn to_shadow(&self) -> Self::Shadow;
    fn from_shadow(shadow: Self::Shadow) -> Result<Self>;
}

macro_rules! scalar_field {
    ($ty:ty, $sql:ident, $v:ident => $to:expr, $raw:ident => $from:expr) => {
        impl Value for $ty {
            fn column(&self) -> Column<'_> {
                let $v = self;
                Column::Scalar($to)
            }

            fn column_mut(&mut self) -> ColumnMut<'_> {
                ColumnMut::Scalar(self)
            }
        }

        impl Slot for $ty {
            fn set(&mut self, $raw: ValueRef<'_>) -> FromSqlResult<()> {
                *self = $from;
                Ok(())
            }

            fn reset(&mut self) {
                *self = <$ty>::default();
            }
        }

        impl Field for $ty {
            const SQL_TYPE: SqlType = SqlType::$sql;
        }
    };
}

scalar_field!(i8, TinyInt, v => SqlValue::Integer(i64::from(*v)), raw => i8::column_result(raw)?);
scalar_field!(i16, SmallInt, v => SqlValue::Integer(i64::from(*v)), raw => i16::column_result(raw)?);
scalar_field!(i32, Integer, v => SqlValue::Integer(i64::from(*v)), raw => i32::column_result(raw)?);
scalar_field!(i64, BigInt, v => SqlValue::Integer(*v), raw => i64::column_result(raw)?);
scalar_field!(u8, SmallInt, v => SqlValue::Integer(i64::from(*v)), raw => u8::column_result(raw)?);
scalar_field!(u16, Integer, v => SqlValue::Integer(i64::from(*v)), raw => u16::column_result(raw)?);
scalar_field!(u32, BigInt, v => SqlValue::Integer(i64::from(*v)), raw => u32::column_result(raw)?);
scalar_field!(f32, Real, v => SqlValue::Real(f64::from(*v)), raw => f64::column_result(raw)? as f32);
scalar_field!(f64, Double, v => SqlValue::Real(*v), raw => f64::column_result(raw)?);
scalar_field!(String, Text, v => SqlValue::Text(v.clone()), raw => String::column_result(raw)?);
scalar_field!(bool, Boolean, v => SqlValue::Integer(i64::from(*v)), raw => bool::column_result(raw)?);

impl<T: Field> Value for Option<T> {
    fn column(&self) -> Column<'_> {
        match self {
            Some(value) => value.column(),
            None => Column::Null,
        }
    }

    fn column_mut(&mut self) -> ColumnMut<'_> {
        ColumnMut::Optional(self)
    }
}

impl<T: Field> OptionalSlot for Option<T> {
    fn ensure(&mut self) -> &mut dyn Value {
        self.get_or_insert_with(T::default)
    }

    fn clear(&mut self) {
        *self = None;
    }
}

impl<T: Field> Field for Option<T> {
    const SQL_TYPE: SqlType = T::SQL_TYPE;
    const NULLABLE: bool = true;

    fn nested() -> Option<&'static TableSchema> {
        T::nested()
    }
}

/// First leaf value of a field, following Composite/External nesting.
///
/// `None` when that leaf is NULL.
pub fn key_value(value: &dyn Value) -> Option<SqlValue> {
    match value.column() {
        Column::Null | Column::Scalar(SqlValue::Null) => None,
        Column::Scalar(scalar) => Some(scalar),
        Column::Composite(record) => first_key(record),
        Column::External(shadow) => first_key(shadow.as_ref()),
    }
}

fn first_key(record: &dyn Record) -> Option<SqlValue> {
    let values = record.values();
    values.first().and_then(|v| key_value(*v))
}
