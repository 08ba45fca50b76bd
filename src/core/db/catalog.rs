/// Catalog Introspection Module
///
/// Reads back what the mapper created: table names, column metadata and
/// foreign key relationships, straight from `sqlite_master` and the
/// table-valued PRAGMA functions.

use crate::core::db::connection::Database;
use crate::core::Result;
use rusqlite::Row;

/// Represents a foreign key relationship
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyInfo {
    /// The table this foreign key references
    pub referenced_table: String,
    /// The column in this table that is the foreign key
    pub from_column: String,
    /// The referenced column in the foreign table
    pub to_column: String,
    /// ON DELETE action, e.g. "CASCADE"
    pub on_delete: String,
    /// ON UPDATE action
    pub on_update: String,
}

/// Represents a database column with its metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Declared type name (e.g., "INTEGER", "TEXT", "DOUBLE")
    pub type_name: String,
    /// Whether the column is declared NOT NULL
    pub notnull: bool,
    /// Whether this column is part of the primary key
    pub pk: bool,
}

impl ColumnInfo {
    fn from_pragma_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ColumnInfo {
            name: row.get(0)?,
            type_name: row.get(1)?,
            notnull: row.get(2)?,
            pk: row.get(3)?,
        })
    }
}

/// Names of all user tables, sorted
pub fn table_names(db: &Database) -> Result<Vec<String>> {
    let conn = db.connection()?;
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type='table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

/// Column metadata of `table` in declaration order
pub fn table_columns(db: &Database, table: &str) -> Result<Vec<ColumnInfo>> {
    let conn = db.connection()?;
    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid",
    )?;
    let columns = stmt
        .query_map([table], |row| ColumnInfo::from_pragma_row(row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

/// Foreign keys declared on `table`
pub fn foreign_keys(db: &Database, table: &str) -> Result<Vec<ForeignKeyInfo>> {
    let conn = db.connection()?;
    let mut stmt = conn.prepare(
        "SELECT \"table\", \"from\", \"to\", on_delete, on_update FROM pragma_foreign_key_list(?1)",
    )?;
    let keys = stmt
        .query_map([table], |row| {
            Ok(ForeignKeyInfo {
                referenced_table: row.get(0)?,
                from_column: row.get(1)?,
                to_column: row.get(2)?,
                on_delete: row.get(3)?,
                on_update: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(keys)
}

/// Number of rows currently stored in `table`
pub fn row_count(db: &Database, table: &str) -> Result<i64> {
    let conn = db.connection()?;
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |row| {
        row.get(0)
    })?;
    Ok(count)
}
