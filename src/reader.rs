//! Reader
//!
//! Runs one prepared SELECT at a time and materializes each result row into
//! a fresh `T`, walking the row's columns in the same order the writer binds
//! them. Vector fields are filled by querying each child table with the
//! row's key.

use crate::core::db::backend::{BindCursor, ColumnSink, FetchCursor};
use crate::core::db::connection::Database;
use crate::core::{OrmError, Result};
use crate::mapper::TableMapper;
use crate::schema::types::{ColumnMut, SqlValue, Value};
use crate::schema::{Entity, FieldSchema, Record, TableSchema};
use crate::sql;
use rusqlite::types::ValueRef;
use rusqlite::Statement;
use std::marker::PhantomData;
use tracing::{debug, error};

/// Row selection of a prepared reader.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Every row of the table
    Scan,
    /// Rows matching a literal WHERE clause, inlined verbatim.
    ///
    /// Never build the predicate from untrusted input.
    Predicate(String),
    /// The row whose primary key equals the value
    PrimaryKey(SqlValue),
    /// Rows of a child table owned by the parent with this key
    ForeignKey(SqlValue),
}

/// Fills one field from the cursor; returns whether any leaf was non-NULL.
pub fn fetch_from_column(
    cursor: &mut FetchCursor<'_, '_>,
    field: &FieldSchema,
    value: &mut dyn Value,
) -> Result<bool> {
    match value.column_mut() {
        ColumnMut::Scalar(slot) => {
            let index = cursor.position();
            let raw = cursor.next_value()?;
            if let ValueRef::Null = raw {
                slot.reset();
                return Ok(false);
            }
            slot.set(raw).map_err(|e| {
                error!("Column {} ({}) does not convert: {}", index, field.column, e);
                OrmError::FetchFailed {
                    index,
                    message: format!("{}: {}", field.column, e),
                }
            })?;
            Ok(true)
        }
        ColumnMut::Optional(optional) => {
            let present = fetch_from_column(cursor, field, optional.ensure())?;
            if !present {
                optional.clear();
            }
            Ok(present)
        }
        ColumnMut::Composite(record) => fetch_record(cursor, field.require_nested()?, record),
        ColumnMut::External(slot) => {
            let nested = field.require_nested()?;
            slot.with_shadow(&mut |shadow: &mut dyn Record| fetch_record(cursor, nested, shadow))
        }
    }
}

/// Fills every declared field of `record` in column order.
pub fn fetch_record(
    cursor: &mut FetchCursor<'_, '_>,
    schema: &TableSchema,
    record: &mut dyn Record,
) -> Result<bool> {
    let mut present = false;
    for (field, value) in schema.fields.iter().zip(record.values_mut()) {
        present |= fetch_from_column(cursor, field, value)?;
    }
    Ok(present)
}

pub struct Reader<'c, T: Entity> {
    db: &'c Database,
    mapper: &'c TableMapper,
    query: Option<Query>,
    stmt: Option<Statement<'c>>,
    _entity: PhantomData<fn() -> T>,
}

impl<'c, T: Entity> Reader<'c, T> {
    pub fn new(db: &'c Database, mapper: &'c TableMapper) -> Self {
        Reader {
            db,
            mapper,
            query: None,
            stmt: None,
            _entity: PhantomData,
        }
    }

    /// The prepared query, `None` when idle
    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    /// Prepares the SELECT for `query` and binds its key, if any.
    pub fn prepare(&mut self, query: Query) -> Result<()> {
        let (db, mapper) = (self.db, self.mapper);
        let table = mapper.table_name();
        let schema = mapper.schema();
        if let Some(current) = &self.query {
            error!("Reader on {} is already prepared for {:?}", table, current);
            return Err(OrmError::AlreadyPrepared {
                table: table.to_string(),
                operation: format!("{:?}", current),
            });
        }

        let (sql, key) = match &query {
            Query::Scan => (sql::scan(table, schema), None),
            Query::Predicate(predicate) => (sql::query(table, schema, predicate), None),
            Query::PrimaryKey(key) => (sql::query_by_primary_key(table, schema)?, Some(key)),
            Query::ForeignKey(key) => {
                let fk = mapper.foreign_key().ok_or_else(|| {
                    OrmError::Schema(format!("{} is not a child table", table))
                })?;
                (sql::query_by_foreign_key(table, schema, fk), Some(key))
            }
        };

        let conn = db.connection()?;
        debug!("Preparing query on {}: {}", table, sql);
        let mut stmt = conn.prepare(&sql).map_err(|source| {
            error!("Failed to prepare `{}`: {}", sql, source);
            OrmError::PrepareFailed {
                sql: sql.clone(),
                source,
            }
        })?;
        if let Some(key) = key {
            BindCursor::new(&mut stmt).put(key.clone())?;
        }
        self.stmt = Some(stmt);
        self.query = Some(query);
        Ok(())
    }

    /// Calls `each` with every matching row, children included.
    ///
    /// Stepping can be repeated: every call reruns the prepared query.
    pub fn fetch_each<F>(&mut self, each: F) -> Result<usize>
    where
        F: FnMut(T) -> Result<()>,
    {
        self.fetch_rows(None, each)
    }

    pub fn fetch_all(&mut self) -> Result<Vec<T>> {
        let mut objects = Vec::new();
        self.fetch_rows(None, |object| {
            objects.push(object);
            Ok(())
        })?;
        Ok(objects)
    }

    /// First matching row, if any.
    pub fn fetch_one(&mut self) -> Result<Option<T>> {
        let mut first = None;
        self.fetch_rows(Some(1), |object| {
            first = Some(object);
            Ok(())
        })?;
        Ok(first)
    }

    fn fetch_rows<F>(&mut self, limit: Option<usize>, mut each: F) -> Result<usize>
    where
        F: FnMut(T) -> Result<()>,
    {
        let (db, mapper) = (self.db, self.mapper);
        let table = mapper.table_name();
        let stmt = self.stmt.as_mut().ok_or_else(|| {
            error!("Reader on {} is not prepared", table);
            OrmError::NotPrepared {
                table: table.to_string(),
                operation: "query".to_string(),
            }
        })?;

        let mut rows = stmt.raw_query();
        let mut count = 0;
        while limit.map_or(true, |limit| count < limit) {
            let row = match rows.next() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(source) => {
                    error!("Failed to step query on {}: {}", table, source);
                    return Err(OrmError::StepFailed {
                        table: table.to_string(),
                        source,
                    });
                }
            };

            let mut object = T::default();
            let mut cursor = FetchCursor::new(row);
            fetch_record(&mut cursor, mapper.schema(), &mut object)?;
            if !mapper.children().is_empty() {
                if let Some(key) = object.key() {
                    for (children, child) in object.children_mut().into_iter().zip(mapper.children()) {
                        children.read(db, child, &key)?;
                    }
                }
            }
            each(object)?;
            count += 1;
        }
        debug!("Fetched {} row(s) from {}", count, table);
        Ok(count)
    }

    /// Releases the prepared statement and returns the reader to idle.
    pub fn finalize(&mut self) -> Result<()> {
        self.query = None;
        if let Some(stmt) = self.stmt.take() {
            stmt.finalize().map_err(|e| {
                error!("Failed to finalize query on {}: {}", self.mapper.table_name(), e);
                OrmError::FinalizeFailed(e)
            })?;
        }
        Ok(())
    }
}
