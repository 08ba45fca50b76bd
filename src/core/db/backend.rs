/// Statement Backend Module
///
/// Thin cursors over `rusqlite` statements and rows. SQLite numbers bind
/// parameters from 1 and result columns from 0; both cursors start at the
/// first position of their own scheme, so callers only ever say "next".

use crate::core::{OrmError, Result};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Row, Statement};
use tracing::error;

/// Destination for a flattened walk over a record's leaf columns.
pub trait ColumnSink {
    /// Accept the next leaf value in column order.
    fn put(&mut self, value: SqlValue) -> Result<()>;
}

/// Collects leaf values instead of binding them (used by the literal SQL paths).
impl ColumnSink for Vec<SqlValue> {
    fn put(&mut self, value: SqlValue) -> Result<()> {
        self.push(value);
        Ok(())
    }
}

/// Binds values to consecutive placeholders of a prepared statement.
pub struct BindCursor<'s, 'c> {
    stmt: &'s mut Statement<'c>,
    index: usize,
}

impl<'s, 'c> BindCursor<'s, 'c> {
    pub fn new(stmt: &'s mut Statement<'c>) -> Self {
        BindCursor { stmt, index: 1 }
    }

    fn bound(&self) -> usize {
        self.index - 1
    }

    /// Fails unless every placeholder of the statement has been bound
    pub fn finish(&self) -> Result<()> {
        let expected = self.stmt.parameter_count();
        if self.bound() != expected {
            error!("Statement expects {} parameter(s), {} bound", expected, self.bound());
            return Err(OrmError::Schema(format!(
                "statement expects {} parameter(s), {} bound",
                expected,
                self.bound()
            )));
        }
        Ok(())
    }

    /// Overwrites every placeholder with NULL so no stale value survives
    pub fn clear(&mut self) -> Result<()> {
        for index in 1..=self.stmt.parameter_count() {
            self.stmt
                .raw_bind_parameter(index, SqlValue::Null)
                .map_err(|source| OrmError::BindFailed { index, source })?;
        }
        self.index = 1;
        Ok(())
    }
}

impl ColumnSink for BindCursor<'_, '_> {
    fn put(&mut self, value: SqlValue) -> Result<()> {
        let index = self.index;
        self.stmt.raw_bind_parameter(index, &value).map_err(|source| {
            error!("Failed to bind parameter {}: {}", index, source);
            OrmError::BindFailed { index, source }
        })?;
        self.index += 1;
        Ok(())
    }
}

/// Reads consecutive columns of one result row.
pub struct FetchCursor<'r, 's> {
    row: &'r Row<'s>,
    index: usize,
}

impl<'r, 's> FetchCursor<'r, 's> {
    pub fn new(row: &'r Row<'s>) -> Self {
        FetchCursor { row, index: 0 }
    }

    /// Index of the column the next read will consume
    pub fn position(&self) -> usize {
        self.index
    }

    /// Reads the next column without converting it
    pub fn next_value(&mut self) -> Result<ValueRef<'r>> {
        let index = self.index;
        let value = self.row.get_ref(index).map_err(|e| {
            error!("Failed to read column {}: {}", index, e);
            OrmError::FetchFailed {
                index,
                message: e.to_string(),
            }
        })?;
        self.index += 1;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_bind_cursor_starts_at_one() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (a INTEGER, b TEXT);").unwrap();
        let mut stmt = conn.prepare("INSERT INTO t (a, b) VALUES (?, ?)").unwrap();
        {
            let mut cursor = BindCursor::new(&mut stmt);
            cursor.put(SqlValue::Integer(7)).unwrap();
            cursor.put(SqlValue::Null).unwrap();
            assert_eq!(cursor.bound(), 2);
            assert!(cursor.put(SqlValue::Integer(1)).is_err());
            assert_eq!(cursor.bound(), 2);
            cursor.finish().unwrap();
        }
        assert_eq!(stmt.raw_execute().unwrap(), 1);

        let (a, b): (i64, Option<String>) = conn
            .query_row("SELECT a, b FROM t", [], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap();
        assert_eq!(a, 7);
        assert_eq!(b, None);
    }

    #[test]
    fn test_finish_rejects_unbound_placeholders() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (a INTEGER, b TEXT);").unwrap();
        let mut stmt = conn.prepare("INSERT INTO t (a, b) VALUES (?, ?)").unwrap();
        let mut cursor = BindCursor::new(&mut stmt);
        cursor.put(SqlValue::Integer(1)).unwrap();
        assert!(matches!(cursor.finish(), Err(OrmError::Schema(_))));

        cursor.clear().unwrap();
        assert_eq!(cursor.bound(), 0);
    }

    #[test]
    fn test_fetch_cursor_starts_at_zero() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT 1, NULL, 'x'").unwrap();
        let mut rows = stmt.raw_query();
        let row = rows.next().unwrap().unwrap();
        let mut cursor = FetchCursor::new(row);
        assert_eq!(cursor.next_value().unwrap(), ValueRef::Integer(1));
        assert_eq!(cursor.next_value().unwrap(), ValueRef::Null);
        assert_eq!(cursor.next_value().unwrap(), ValueRef::Text(b"x"));
        assert_eq!(cursor.position(), 3);
        assert!(matches!(cursor.next_value(), Err(OrmError::FetchFailed { index: 3, .. })));
    }

    #[test]
    fn test_vec_sink_collects_values() {
        let mut sink: Vec<SqlValue> = Vec::new();
        sink.put(SqlValue::Text("a".into())).unwrap();
        sink.put(SqlValue::Null).unwrap();
        assert_eq!(sink, vec![SqlValue::Text("a".into()), SqlValue::Null]);
    }
}
