//! Statement Builder
//!
//! Pure functions turning a reflected schema, an optional foreign key and
//! an optional predicate into SQL text. Composite and External fields expand
//! in place into `<field>_<column>` leaf columns; the placeholder order of
//! every statement is exactly the order the writer binds in.
//!
//! Identifiers are always double-quoted. The `*_literal` builders inline
//! values instead of using placeholders and wrap text in single quotes
//! WITHOUT escaping embedded quotes, and predicates passed to [`query`] are
//! concatenated verbatim. Both are injection surfaces: only feed them
//! trusted input.

use crate::core::{OrmError, Result};
use crate::schema::types::{SqlType, SqlValue};
use crate::schema::{FieldSchema, ForeignKeyConstraint, TableSchema};
use std::fmt::Write;

/// One physical column produced by flattening a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafColumn {
    pub name: String,
    pub sql_type: SqlType,
    pub nullable: bool,
}

/// Flattened columns of a schema, in bind order.
pub fn leaf_columns(schema: &TableSchema) -> Vec<LeafColumn> {
    let mut out = Vec::new();
    for field in &schema.fields {
        push_leaves(field, "", false, &mut out);
    }
    out
}

fn push_leaves(field: &FieldSchema, prefix: &str, parent_nullable: bool, out: &mut Vec<LeafColumn>) {
    let name = format!("{}{}", prefix, field.column);
    let nullable = parent_nullable || field.nullable;
    match field.nested() {
        Some(nested) if field.kind().is_nested() => {
            let prefix = format!("{}_", name);
            for sub in &nested.fields {
                push_leaves(sub, &prefix, nullable, out);
            }
        }
        _ => out.push(LeafColumn {
            name,
            sql_type: field.sql_type,
            nullable,
        }),
    }
}

/// The primary key's first leaf column; `None` for keyless schemas.
///
/// A Composite or External key flattens recursively to its first leaf.
pub fn key_column(schema: &TableSchema) -> Option<LeafColumn> {
    let mut field = schema.primary_key()?;
    let mut name = field.column.to_string();
    while field.kind().is_nested() {
        let nested = field.nested()?;
        field = nested.fields.first()?;
        name = format!("{}_{}", name, field.column);
    }
    Some(LeafColumn {
        name,
        sql_type: field.sql_type,
        nullable: field.nullable,
    })
}

fn require_key(table: &str, schema: &TableSchema) -> Result<LeafColumn> {
    key_column(schema).ok_or_else(|| {
        OrmError::Schema(format!("table {} has no primary key", table))
    })
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier)
}

fn column_list(columns: &[LeafColumn]) -> String {
    columns
        .iter()
        .map(|c| quote(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn type_name(sql_type: SqlType) -> &'static str {
    sql_type.sql_name().unwrap_or("BLOB")
}

/// `CREATE TABLE IF NOT EXISTS` for `table`.
pub fn create_table(table: &str, schema: &TableSchema, fk: Option<&ForeignKeyConstraint>) -> String {
    let mut definitions = Vec::new();
    for (index, column) in leaf_columns(schema).iter().enumerate() {
        let mut definition = format!("{} {}", quote(&column.name), type_name(column.sql_type));
        if index == 0 && schema.keyed {
            definition.push_str(" PRIMARY KEY");
        } else if !column.nullable {
            definition.push_str(" NOT NULL");
        }
        definitions.push(definition);
    }
    if let Some(fk) = fk {
        definitions.push(format!(
            "{} {} NOT NULL",
            quote(&fk.child_column),
            type_name(fk.sql_type)
        ));
        definitions.push(format!(
            "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE CASCADE ON UPDATE CASCADE",
            quote(&fk.child_column),
            quote(&fk.parent_table),
            quote(&fk.parent_column)
        ));
    }
    format!("CREATE TABLE IF NOT EXISTS {} ({});", quote(table), definitions.join(", "))
}

pub fn drop_table(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {};", quote(table))
}

/// INSERT with one placeholder per leaf column, plus the foreign key column.
pub fn insert(table: &str, schema: &TableSchema, fk: Option<&ForeignKeyConstraint>) -> String {
    let mut names: Vec<String> = leaf_columns(schema).iter().map(|c| quote(&c.name)).collect();
    if let Some(fk) = fk {
        names.push(quote(&fk.child_column));
    }
    let placeholders = vec!["?"; names.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({});",
        quote(table),
        names.join(", "),
        placeholders
    )
}

/// UPDATE of every leaf column (and the foreign key), filtered by primary key.
pub fn update(table: &str, schema: &TableSchema, fk: Option<&ForeignKeyConstraint>) -> Result<String> {
    let key = require_key(table, schema)?;
    let mut assignments: Vec<String> = leaf_columns(schema)
        .iter()
        .map(|c| format!("{} = ?", quote(&c.name)))
        .collect();
    if let Some(fk) = fk {
        assignments.push(format!("{} = ?", quote(&fk.child_column)));
    }
    Ok(format!(
        "UPDATE {} SET {} WHERE {} = ?;",
        quote(table),
        assignments.join(", "),
        quote(&key.name)
    ))
}

/// DELETE by primary key, additionally scoped to the parent row when `fk` is set.
pub fn delete(table: &str, schema: &TableSchema, fk: Option<&ForeignKeyConstraint>) -> Result<String> {
    let key = require_key(table, schema)?;
    let mut sql = format!("DELETE FROM {} WHERE {} = ?", quote(table), quote(&key.name));
    if let Some(fk) = fk {
        let _ = write!(sql, " AND {} = ?", quote(&fk.child_column));
    }
    sql.push(';');
    Ok(sql)
}

fn select(table: &str, schema: &TableSchema) -> String {
    format!("SELECT {} FROM {}", column_list(&leaf_columns(schema)), quote(table))
}

pub fn scan(table: &str, schema: &TableSchema) -> String {
    format!("{};", select(table, schema))
}

/// SELECT filtered by a caller-supplied predicate, inserted verbatim.
pub fn query(table: &str, schema: &TableSchema, predicate: &str) -> String {
    format!("{} WHERE {};", select(table, schema), predicate)
}

pub fn query_by_primary_key(table: &str, schema: &TableSchema) -> Result<String> {
    let key = require_key(table, schema)?;
    Ok(format!("{} WHERE {} = ?;", select(table, schema), quote(&key.name)))
}

pub fn query_by_foreign_key(table: &str, schema: &TableSchema, fk: &ForeignKeyConstraint) -> String {
    format!("{} WHERE {} = ?;", select(table, schema), quote(&fk.child_column))
}

/// Renders a value as an SQL literal. Text is quoted but not escaped.
pub fn literal(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Real(f) if f.is_nan() => "NULL".to_string(),
        SqlValue::Real(f) if f.is_infinite() => {
            if *f > 0.0 { "9e999".to_string() } else { "-9e999".to_string() }
        }
        SqlValue::Real(f) => format!("{:?}", f),
        SqlValue::Text(text) => format!("'{}'", text),
        SqlValue::Blob(bytes) => {
            let mut hex = String::with_capacity(bytes.len() * 2 + 3);
            hex.push_str("X'");
            for byte in bytes {
                let _ = write!(hex, "{:02X}", byte);
            }
            hex.push('\'');
            hex
        }
    }
}

fn literal_list(values: &[SqlValue]) -> String {
    values.iter().map(literal).collect::<Vec<_>>().join(", ")
}

/// INSERT with values inlined.
pub fn insert_literal(table: &str, schema: &TableSchema, values: &[SqlValue]) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({});",
        quote(table),
        column_list(&leaf_columns(schema)),
        literal_list(values)
    )
}

/// UPDATE with values inlined, filtered by the literal `key`.
pub fn update_literal(table: &str, schema: &TableSchema, values: &[SqlValue], key: &SqlValue) -> Result<String> {
    let key_column = require_key(table, schema)?;
    let assignments = leaf_columns(schema)
        .iter()
        .zip(values)
        .map(|(column, value)| format!("{} = {}", quote(&column.name), literal(value)))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!(
        "UPDATE {} SET {} WHERE {} = {};",
        quote(table),
        assignments,
        quote(&key_column.name),
        literal(key)
    ))
}

/// DELETE by the literal `key`.
pub fn delete_literal(table: &str, schema: &TableSchema, key: &SqlValue) -> Result<String> {
    let key_column = require_key(table, schema)?;
    Ok(format!(
        "DELETE FROM {} WHERE {} = {};",
        quote(table),
        quote(&key_column.name),
        literal(key)
    ))
}
