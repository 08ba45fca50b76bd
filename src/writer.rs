//! Writer
//!
//! Binds mapped objects to prepared INSERT, UPDATE and DELETE statements.
//! A writer moves through `None -> prepare(op) -> op -> finalize -> None`
//! around exactly one prepared statement. After an inserted row is stepped,
//! the writer cascades into the row's vector fields with child writers.
//! Nothing here opens a transaction; wrap calls in `Database::begin` /
//! `Database::commit` when a parent and its children must land atomically.

use crate::core::db::backend::{BindCursor, ColumnSink};
use crate::core::db::connection::Database;
use crate::core::{OrmError, Result};
use crate::mapper::TableMapper;
use crate::schema::types::{Column, SqlValue, Value};
use crate::schema::{Entity, FieldSchema, Record, TableSchema};
use crate::sql;
use rusqlite::Statement;
use std::marker::PhantomData;
use tracing::{debug, error, warn};

/// How an update treats the child tables of a CompositeVector type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Rewrite the row's own columns; child rows stay as they are
    Columns,
    /// Delete the original row (cascading to its children) and reinsert the
    /// updated object with all of its children. Holds a DELETE and an INSERT
    /// statement for the whole batch.
    ReplaceChildren,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Update(UpdateMode),
    Delete,
}

/// Outcome of walking a record's columns.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BindTally {
    /// Leaf columns that received a value
    pub values: usize,
    /// Leaf columns bound to NULL
    pub nulls: usize,
    /// A nullable Composite/External field had no value at all
    pub vacant: bool,
}

impl BindTally {
    fn absorb(&mut self, other: BindTally) {
        self.values += other.values;
        self.nulls += other.nulls;
        self.vacant |= other.vacant;
    }

    /// A row with a vacant field or without a single value is never written.
    pub fn writes_nothing(&self) -> bool {
        self.vacant || self.values == 0
    }
}

/// Feeds one field's leaf values to `sink`, recursing through nested fields.
pub fn bind_to_column<S: ColumnSink + ?Sized>(
    sink: &mut S,
    field: &FieldSchema,
    value: &dyn Value,
    tally: &mut BindTally,
) -> Result<()> {
    match value.column() {
        Column::Null => {
            let leaves = field.leaf_count();
            for _ in 0..leaves {
                sink.put(SqlValue::Null)?;
            }
            tally.nulls += leaves;
            if field.kind().is_nested() {
                tally.vacant = true;
            }
        }
        Column::Scalar(SqlValue::Null) => {
            sink.put(SqlValue::Null)?;
            tally.nulls += 1;
        }
        Column::Scalar(scalar) => {
            sink.put(scalar)?;
            tally.values += 1;
        }
        Column::Composite(record) => bind_nested(sink, field, record, tally)?,
        Column::External(shadow) => bind_nested(sink, field, shadow.as_ref(), tally)?,
    }
    Ok(())
}

fn bind_nested<S: ColumnSink + ?Sized>(
    sink: &mut S,
    field: &FieldSchema,
    record: &dyn Record,
    tally: &mut BindTally,
) -> Result<()> {
    let nested = field.require_nested()?;
    let mut inner = BindTally::default();
    for (sub, value) in nested.fields.iter().zip(record.values()) {
        bind_to_column(sink, sub, value, &mut inner)?;
    }
    if field.nullable && inner.values == 0 {
        inner.vacant = true;
    }
    tally.absorb(inner);
    Ok(())
}

/// Walks every declared field of `record` in column order.
pub fn bind_record<S: ColumnSink + ?Sized>(
    sink: &mut S,
    schema: &TableSchema,
    record: &dyn Record,
) -> Result<BindTally> {
    let mut tally = BindTally::default();
    for (field, value) in schema.fields.iter().zip(record.values()) {
        bind_to_column(sink, field, value, &mut tally)?;
    }
    Ok(tally)
}

/// Binds the record's columns (if any) and the trailing key values, then steps.
fn step_row(
    stmt: &mut Statement<'_>,
    table: &str,
    schema: &TableSchema,
    record: Option<&dyn Record>,
    trailing: &[&SqlValue],
) -> Result<usize> {
    let result = bind_and_step(stmt, table, schema, record, trailing);
    if result.is_err() {
        let _ = BindCursor::new(stmt).clear();
    }
    result
}

fn bind_and_step(
    stmt: &mut Statement<'_>,
    table: &str,
    schema: &TableSchema,
    record: Option<&dyn Record>,
    trailing: &[&SqlValue],
) -> Result<usize> {
    let mut cursor = BindCursor::new(stmt);
    if let Some(record) = record {
        let tally = bind_record(&mut cursor, schema, record)?;
        if tally.writes_nothing() {
            warn!(
                "Skipping write to {}: {} null column(s), vacant field: {}",
                table, tally.nulls, tally.vacant
            );
            cursor.clear()?;
            return Ok(0);
        }
    }
    for value in trailing {
        cursor.put((*value).clone())?;
    }
    cursor.finish()?;
    stmt.raw_execute().map_err(|source| {
        error!("Failed to step statement on {}: {}", table, source);
        OrmError::StepFailed {
            table: table.to_string(),
            source,
        }
    })
}

/// Inserts every vector field of `object` under the row key `key`.
fn write_children<T: Entity>(
    db: &Database,
    mapper: &TableMapper,
    object: &T,
    key: &SqlValue,
) -> Result<()> {
    for (children, child) in object.children().into_iter().zip(mapper.children()) {
        children.write(db, child, key)?;
    }
    Ok(())
}

/// Writes objects of type `T` through one prepared statement at a time.
pub struct Writer<'c, T: Entity> {
    db: &'c Database,
    mapper: &'c TableMapper,
    parent_key: Option<SqlValue>,
    operation: Option<Operation>,
    stmt: Option<Statement<'c>>,
    /// INSERT half of a `ReplaceChildren` update; `stmt` holds the DELETE
    reinsert: Option<Statement<'c>>,
    _entity: PhantomData<fn(&T)>,
}

impl<'c, T: Entity> Writer<'c, T> {
    pub fn new(db: &'c Database, mapper: &'c TableMapper) -> Self {
        Writer {
            db,
            mapper,
            parent_key: None,
            operation: None,
            stmt: None,
            reinsert: None,
            _entity: PhantomData,
        }
    }

    /// Writer for a child table; `parent_key` fills the foreign key column.
    pub fn for_child(db: &'c Database, mapper: &'c TableMapper, parent_key: SqlValue) -> Self {
        Writer {
            parent_key: Some(parent_key),
            ..Writer::new(db, mapper)
        }
    }

    /// The operation currently prepared, `None` when idle
    pub fn operation(&self) -> Option<Operation> {
        self.operation
    }

    pub fn prepare(&mut self, operation: Operation) -> Result<()> {
        let (db, mapper) = (self.db, self.mapper);
        let table = mapper.table_name();
        if let Some(current) = self.operation {
            error!("Writer on {} is already prepared for {:?}", table, current);
            return Err(OrmError::AlreadyPrepared {
                table: table.to_string(),
                operation: format!("{:?}", current),
            });
        }
        if mapper.foreign_key().is_some() && self.parent_key.is_none() {
            error!("Writer on child table {} has no parent key", table);
            return Err(OrmError::Schema(format!(
                "child table {} can only be written with a parent key",
                table
            )));
        }

        let conn = db.connection()?;
        let schema = mapper.schema();
        let fk = mapper.foreign_key();
        let prepare_sql = |sql: String| -> Result<Statement<'c>> {
            debug!("Preparing {:?} on {}: {}", operation, table, sql);
            conn.prepare(&sql).map_err(|source| {
                error!("Failed to prepare `{}`: {}", sql, source);
                OrmError::PrepareFailed {
                    sql: sql.clone(),
                    source,
                }
            })
        };
        match operation {
            Operation::Insert => self.stmt = Some(prepare_sql(sql::insert(table, schema, fk))?),
            Operation::Update(UpdateMode::Columns) => {
                self.stmt = Some(prepare_sql(sql::update(table, schema, fk)?)?)
            }
            Operation::Update(UpdateMode::ReplaceChildren) => {
                let remove = prepare_sql(sql::delete(table, schema, fk)?)?;
                self.reinsert = Some(prepare_sql(sql::insert(table, schema, fk))?);
                self.stmt = Some(remove);
            }
            Operation::Delete => self.stmt = Some(prepare_sql(sql::delete(table, schema, fk)?)?),
        }
        self.operation = Some(operation);
        Ok(())
    }

    /// Releases the prepared statement and returns the writer to idle.
    pub fn finalize(&mut self) -> Result<()> {
        self.operation = None;
        let table = self.mapper.table_name();
        let mut result = Ok(());
        for stmt in [self.stmt.take(), self.reinsert.take()].into_iter().flatten() {
            if let Err(e) = stmt.finalize() {
                error!("Failed to finalize statement on {}: {}", table, e);
                if result.is_ok() {
                    result = Err(OrmError::FinalizeFailed(e));
                }
            }
        }
        result
    }

    fn not_prepared(&self, wanted: Operation) -> OrmError {
        let table = self.mapper.table_name();
        error!("Writer on {} is not prepared for {:?}", table, wanted);
        OrmError::NotPrepared {
            table: table.to_string(),
            operation: format!("{:?}", wanted),
        }
    }

    fn statement(&mut self, wanted: Operation) -> Result<&mut Statement<'c>> {
        if self.operation != Some(wanted) || self.stmt.is_none() {
            return Err(self.not_prepared(wanted));
        }
        match self.stmt.as_mut() {
            Some(stmt) => Ok(stmt),
            None => Err(OrmError::NotPrepared {
                table: self.mapper.table_name().to_string(),
                operation: format!("{:?}", wanted),
            }),
        }
    }

    /// Key of a keyed row; keyless schemas yield `None`.
    fn row_key(&self, object: &T) -> Result<Option<SqlValue>> {
        if !self.mapper.schema().keyed {
            return Ok(None);
        }
        self.require_key(object).map(Some)
    }

    fn require_key(&self, object: &T) -> Result<SqlValue> {
        let schema = self.mapper.schema();
        if !schema.keyed {
            return Err(OrmError::Schema(format!(
                "table {} has no primary key",
                self.mapper.table_name()
            )));
        }
        object.key().ok_or_else(|| {
            error!("Refusing to write a {} with a NULL primary key", schema.display_name);
            OrmError::NullPrimaryKey(schema.display_name.to_string())
        })
    }

    /// Inserts one row, then the rows of its vector fields.
    ///
    /// Returns the rows written to this table: 0 when every column was NULL
    /// or a nullable Composite/External field was vacant.
    pub fn insert(&mut self, object: &T) -> Result<usize> {
        let (db, mapper) = (self.db, self.mapper);
        let key = self.row_key(object)?;
        let parent = self.parent_key.clone();
        let stmt = self.statement(Operation::Insert)?;
        let trailing: Vec<&SqlValue> = parent.iter().collect();
        let rows = step_row(stmt, mapper.table_name(), mapper.schema(), Some(object), &trailing)?;
        if let (true, Some(key)) = (rows > 0, key) {
            write_children(db, mapper, object, &key)?;
        }
        Ok(rows)
    }

    /// Writes `updated`'s values to the row identified by `original`'s key.
    pub fn update(&mut self, original: &T, updated: &T) -> Result<usize> {
        if self.operation == Some(Operation::Update(UpdateMode::ReplaceChildren)) {
            return self.replace(original, updated);
        }
        let mapper = self.mapper;
        let original_key = self.require_key(original)?;
        self.require_key(updated)?;
        let parent = self.parent_key.clone();
        let stmt = self.statement(Operation::Update(UpdateMode::Columns))?;
        let mut trailing: Vec<&SqlValue> = parent.iter().collect();
        trailing.push(&original_key);
        step_row(stmt, mapper.table_name(), mapper.schema(), Some(updated), &trailing)
    }

    /// Deletes the original row with its children and reinserts `updated`.
    ///
    /// A replacement that would write nothing leaves the stored row alone.
    fn replace(&mut self, original: &T, updated: &T) -> Result<usize> {
        let wanted = Operation::Update(UpdateMode::ReplaceChildren);
        let (db, mapper) = (self.db, self.mapper);
        let (table, schema) = (mapper.table_name(), mapper.schema());
        if self.operation != Some(wanted) {
            return Err(self.not_prepared(wanted));
        }
        let original_key = self.require_key(original)?;
        let key = self.require_key(updated)?;

        let tally = bind_record(&mut Vec::<SqlValue>::new(), schema, updated)?;
        if tally.writes_nothing() {
            warn!(
                "Keeping {} row: its replacement has {} null column(s), vacant field: {}",
                table, tally.nulls, tally.vacant
            );
            return Ok(0);
        }

        let parent = self.parent_key.clone();
        let (remove, reinsert) = match (self.stmt.as_mut(), self.reinsert.as_mut()) {
            (Some(remove), Some(reinsert)) => (remove, reinsert),
            _ => {
                return Err(OrmError::NotPrepared {
                    table: table.to_string(),
                    operation: format!("{:?}", wanted),
                })
            }
        };
        debug!("Replacing {} row and its children", table);
        let mut trailing: Vec<&SqlValue> = vec![&original_key];
        trailing.extend(parent.iter());
        step_row(remove, table, schema, None, &trailing)?;

        let trailing: Vec<&SqlValue> = parent.iter().collect();
        let rows = step_row(reinsert, table, schema, Some(updated), &trailing)?;
        if rows > 0 {
            write_children(db, mapper, updated, &key)?;
        }
        Ok(rows)
    }

    /// Deletes the row with `object`'s key; child rows follow by cascade.
    pub fn delete(&mut self, object: &T) -> Result<usize> {
        let mapper = self.mapper;
        let key = self.require_key(object)?;
        let parent = self.parent_key.clone();
        let stmt = self.statement(Operation::Delete)?;
        let mut trailing: Vec<&SqlValue> = vec![&key];
        trailing.extend(parent.iter());
        step_row(stmt, mapper.table_name(), mapper.schema(), None, &trailing)
    }

    /// Inserts every object through one statement, aborting at the first failure.
    pub fn insert_vector(&mut self, objects: &[T]) -> Result<usize> {
        self.batch(Operation::Insert, objects.len(), |writer, i| writer.insert(&objects[i]))
    }

    /// Updates pairwise; both slices must have the same length.
    pub fn update_vector(&mut self, originals: &[T], updated: &[T], mode: UpdateMode) -> Result<usize> {
        if originals.len() != updated.len() {
            error!(
                "Update batch on {}: {} originals vs {} updated",
                self.mapper.table_name(),
                originals.len(),
                updated.len()
            );
            return Err(OrmError::SizeMismatch {
                originals: originals.len(),
                updated: updated.len(),
            });
        }
        self.batch(Operation::Update(mode), originals.len(), |writer, i| {
            writer.update(&originals[i], &updated[i])
        })
    }

    pub fn delete_vector(&mut self, objects: &[T]) -> Result<usize> {
        self.batch(Operation::Delete, objects.len(), |writer, i| writer.delete(&objects[i]))
    }

    fn batch<F>(&mut self, operation: Operation, len: usize, mut each: F) -> Result<usize>
    where
        F: FnMut(&mut Self, usize) -> Result<usize>,
    {
        if len == 0 {
            error!("Empty {:?} batch on {}", operation, self.mapper.table_name());
            return Err(OrmError::EmptyBatch(self.mapper.table_name().to_string()));
        }
        self.prepare(operation)?;
        let mut total = 0;
        for index in 0..len {
            match each(self, index) {
                Ok(rows) => total += rows,
                Err(e) => {
                    error!(
                        "{:?} batch on {} aborted at element {} of {}: {}",
                        operation,
                        self.mapper.table_name(),
                        index,
                        len,
                        e
                    );
                    let _ = self.finalize();
                    return Err(e);
                }
            }
        }
        self.finalize()?;
        Ok(total)
    }

    fn require_top_level(&self) -> Result<()> {
        if self.mapper.foreign_key().is_some() {
            return Err(OrmError::Schema(format!(
                "literal statements are not supported on child table {}",
                self.mapper.table_name()
            )));
        }
        Ok(())
    }

    /// Inserts one row through literal SQL text.
    ///
    /// Text values are inlined in single quotes without escaping, so a value
    /// containing `'` breaks the statement or changes its meaning. Vector
    /// fields are not written. Prefer [`Writer::insert`].
    pub fn insert_raw(&self, object: &T) -> Result<usize> {
        self.require_top_level()?;
        self.row_key(object)?;
        let mapper = self.mapper;
        let mut values: Vec<SqlValue> = Vec::new();
        let tally = bind_record(&mut values, mapper.schema(), object)?;
        if tally.writes_nothing() {
            warn!("Skipping literal insert into {}: nothing to write", mapper.table_name());
            return Ok(0);
        }
        self.db
            .exec(&sql::insert_literal(mapper.table_name(), mapper.schema(), &values))?;
        Ok(self.db.changes()? as usize)
    }

    /// Updates one row through literal SQL text; see [`Writer::insert_raw`].
    pub fn update_raw(&self, original: &T, updated: &T) -> Result<usize> {
        self.require_top_level()?;
        let mapper = self.mapper;
        let key = self.require_key(original)?;
        self.require_key(updated)?;
        let mut values: Vec<SqlValue> = Vec::new();
        let tally = bind_record(&mut values, mapper.schema(), updated)?;
        if tally.writes_nothing() {
            warn!("Skipping literal update of {}: nothing to write", mapper.table_name());
            return Ok(0);
        }
        self.db.exec(&sql::update_literal(
            mapper.table_name(),
            mapper.schema(),
            &values,
            &key,
        )?)?;
        Ok(self.db.changes()? as usize)
    }

    /// Deletes one row through literal SQL text; see [`Writer::insert_raw`].
    pub fn delete_raw(&self, object: &T) -> Result<usize> {
        self.require_top_level()?;
        let key = self.require_key(object)?;
        self.db.exec(&sql::delete_literal(
            self.mapper.table_name(),
            self.mapper.schema(),
            &key,
        )?)?;
        Ok(self.db.changes()? as usize)
    }
}
