/// Schema Reflection Module
///
/// Static descriptions of mapped types. A `TableSchema` is built once per
/// type by the declaration macros and lists the type's fields in declaration
/// order; that order is the column order of every generated statement.
///
/// ## Layout
///
/// - **Types** (`types.rs`): SQL type classification and the field value visitor
/// - **Macros** (`macros.rs`): `orm_entity!`, `orm_enum!` and `orm_external!`
/// - **External** (`external.rs`): mappings for `chrono` and `uuid` types
pub mod external;
pub mod macros;
pub mod types;

use crate::core::db::connection::Database;
use crate::core::{OrmError, Result};
use crate::mapper::TableMapper;
use once_cell::sync::Lazy;
use regex::Regex;
use types::{key_value, Field, SqlType, SqlValue, Value};

pub use external::DateShadow;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Entity-level classification of a mapped type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A single column
    Scalar,
    /// Plain record; nested into parents as flattened columns
    Composite,
    /// Shadow projection of a type that is not reflected directly
    External,
    /// Record owning one or more child tables
    CompositeVector,
}

impl EntityKind {
    /// Classification of a single field type.
    pub fn of(sql_type: SqlType) -> Self {
        match sql_type {
            SqlType::Composite => EntityKind::Composite,
            SqlType::External => EntityKind::External,
            SqlType::CompositeVector => EntityKind::CompositeVector,
            _ => EntityKind::Scalar,
        }
    }

    /// Composite and External fields expand into nested columns.
    pub fn is_nested(self) -> bool {
        matches!(self, EntityKind::Composite | EntityKind::External)
    }
}

/// Descriptor of one declared field.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub name: &'static str,
    pub column: &'static str,
    pub sql_type: SqlType,
    pub nullable: bool,
    nested: fn() -> Option<&'static TableSchema>,
}

impl FieldSchema {
    /// Describes a field of type `F`
    pub fn of<F: Field>(name: &'static str, column: &'static str) -> Self {
        FieldSchema {
            name,
            column,
            sql_type: F::SQL_TYPE,
            nullable: F::NULLABLE,
            nested: F::nested,
        }
    }

    pub fn kind(&self) -> EntityKind {
        EntityKind::of(self.sql_type)
    }

    /// Schema of a Composite or External field; `None` for scalars.
    pub fn nested(&self) -> Option<&'static TableSchema> {
        (self.nested)()
    }

    /// Like `nested`, but a missing schema on a nested kind is an error.
    pub fn require_nested(&self) -> Result<&'static TableSchema> {
        self.nested().ok_or_else(|| {
            OrmError::Schema(format!("field {} has no nested schema", self.name))
        })
    }

    /// Number of physical columns this field occupies.
    pub fn leaf_count(&self) -> usize {
        match self.nested() {
            Some(schema) if self.kind().is_nested() => {
                schema.fields.iter().map(FieldSchema::leaf_count).sum()
            }
            _ => 1,
        }
    }
}

/// Descriptor of one vector field.
#[derive(Debug, Clone)]
pub struct VectorSchema {
    pub name: &'static str,
    element: fn() -> &'static TableSchema,
}

impl VectorSchema {
    pub fn of<E: Entity>(name: &'static str) -> Self {
        VectorSchema {
            name,
            element: E::schema,
        }
    }

    /// Schema of the element type, mapped as a standalone table
    pub fn element(&self) -> &'static TableSchema {
        (self.element)()
    }
}

/// Reflected description of a mapped type.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub table: &'static str,
    pub display_name: &'static str,
    pub kind: EntityKind,
    /// Whether the first field is the primary key
    pub keyed: bool,
    pub fields: Vec<FieldSchema>,
    pub vectors: Vec<VectorSchema>,
}

impl TableSchema {
    pub fn new(
        table: &'static str,
        display_name: &'static str,
        keyed: bool,
        fields: Vec<FieldSchema>,
        vectors: Vec<VectorSchema>,
    ) -> Self {
        let kind = if vectors.is_empty() {
            EntityKind::Composite
        } else {
            EntityKind::CompositeVector
        };
        TableSchema {
            table,
            display_name,
            kind,
            keyed,
            fields,
            vectors,
        }
    }

    /// The same columns presented as the shadow of an External type.
    pub fn projected(&self, display_name: &'static str) -> Self {
        TableSchema {
            display_name,
            kind: EntityKind::External,
            ..self.clone()
        }
    }

    /// Primary key field, `None` for keyless types.
    pub fn primary_key(&self) -> Option<&FieldSchema> {
        if self.keyed {
            self.fields.first()
        } else {
            None
        }
    }

    /// Checks every table and column identifier, descending into nested schemas.
    pub fn validate(&self) -> Result<()> {
        check_identifier(self.table)?;
        if self.fields.is_empty() {
            return Err(OrmError::Schema(format!("{} declares no fields", self.display_name)));
        }
        for field in &self.fields {
            check_identifier(field.column)?;
            if field.kind().is_nested() {
                field.require_nested()?.validate()?;
            }
        }
        if !self.vectors.is_empty() && !self.keyed {
            return Err(OrmError::Schema(format!(
                "{} owns child tables but has no primary key",
                self.display_name
            )));
        }
        Ok(())
    }
}

/// Validates a table or column name.
pub fn check_identifier(name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(OrmError::Schema(format!("invalid identifier: {:?}", name)))
    }
}

/// Link from a child table to the parent table that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyConstraint {
    pub child_table: String,
    pub parent_table: String,
    pub child_column: String,
    pub parent_column: String,
    pub sql_type: SqlType,
}

impl ForeignKeyConstraint {
    pub fn is_valid(&self) -> bool {
        !self.child_table.is_empty()
            && !self.parent_table.is_empty()
            && !self.child_column.is_empty()
            && !self.parent_column.is_empty()
            && self.sql_type.is_scalar()
    }
}

/// Ordered access to a record's fields.
pub trait Record {
    /// References to every declared field, in declaration order.
    fn values(&self) -> Vec<&dyn Value>;
    fn values_mut(&mut self) -> Vec<&mut dyn Value>;

    /// Vector fields, in declaration order.
    fn children(&self) -> Vec<&dyn Children> {
        Vec::new()
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Children> {
        Vec::new()
    }

    /// Value of the primary key's first leaf, `None` when NULL.
    fn key(&self) -> Option<SqlValue> {
        let values = self.values();
        values.first().and_then(|v| key_value(*v))
    }
}

/// A mapped record type.
pub trait Entity: Record + Default + 'static {
    fn schema() -> &'static TableSchema;
}

/// A vector field stored in a child table.
pub trait Children {
    /// Inserts every element under `parent_key`, returning rows written.
    fn write(&self, db: &Database, mapper: &TableMapper, parent_key: &SqlValue) -> Result<usize>;

    /// Replaces the contents with the rows stored under `parent_key`.
    fn read(&mut self, db: &Database, mapper: &TableMapper, parent_key: &SqlValue) -> Result<usize>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::orm_entity! {
        #[derive(Debug, Clone, Default, PartialEq)]
        struct Offset as "offset" {
            dx: i32,
            dy: i32,
        }
    }

    crate::orm_entity! {
        #[derive(Debug, Clone, Default, PartialEq)]
        struct Marker as "marker" {
            id: i64,
            label: Option<String> => "caption",
            offset: Option<Offset>,
        }
    }

    crate::orm_entity! {
        #[derive(Debug, Clone, Default, PartialEq)]
        struct Board as "board" {
            id: i64,
        }
        children {
            markers: Vec<Marker>,
        }
    }

    crate::orm_entity! {
        #[derive(Debug, Clone, Default, PartialEq)]
        struct LogLine [keyless] {
            message: String,
        }
    }

    #[test]
    fn test_fields_follow_declaration_order() {
        let schema = Marker::schema();
        assert_eq!(schema.table, "marker");
        assert_eq!(schema.display_name, "Marker");
        let names: Vec<_> = schema.fields.iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["id", "label", "offset"]);
        assert_eq!(schema.fields[1].column, "caption");
        assert!(schema.fields[1].nullable);
        assert_eq!(schema.fields[2].sql_type, SqlType::Composite);
        assert_eq!(schema.kind, EntityKind::Composite);
    }

    #[test]
    fn test_leaf_count_expands_composites() {
        let schema = Marker::schema();
        assert_eq!(schema.fields[0].leaf_count(), 1);
        assert_eq!(schema.fields[2].leaf_count(), 2);
        assert_eq!(schema.fields[2].nested().unwrap().table, "offset");
    }

    #[test]
    fn test_vector_fields_classify_as_composite_vector() {
        let schema = Board::schema();
        assert_eq!(schema.kind, EntityKind::CompositeVector);
        assert_eq!(schema.vectors.len(), 1);
        assert_eq!(schema.vectors[0].name, "markers");
        assert_eq!(schema.vectors[0].element().table, "marker");
    }

    #[test]
    fn test_default_table_name_and_keyless() {
        let schema = LogLine::schema();
        assert_eq!(schema.table, "LogLine");
        assert!(!schema.keyed);
        assert!(schema.primary_key().is_none());
        assert!(Marker::schema().primary_key().is_some());
    }

    #[test]
    fn test_accessor_is_ordered_and_idempotent() {
        let marker = Marker {
            id: 4,
            label: None,
            offset: Some(Offset { dx: 1, dy: 2 }),
        };
        assert_eq!(marker.values().len(), 3);
        assert_eq!(marker.key(), Some(SqlValue::Integer(4)));
        assert_eq!(marker.key(), marker.key());
    }

    #[test]
    fn test_validate_rejects_bad_identifiers() {
        assert!(Marker::schema().validate().is_ok());
        assert!(check_identifier("point_x").is_ok());
        assert!(check_identifier("drop\"table").is_err());
        assert!(check_identifier("1abc").is_err());
    }

    #[test]
    fn test_foreign_key_validity() {
        let mut fk = ForeignKeyConstraint {
            child_table: "board_marker".into(),
            parent_table: "board".into(),
            child_column: "board_id".into(),
            parent_column: "id".into(),
            sql_type: SqlType::BigInt,
        };
        assert!(fk.is_valid());
        fk.sql_type = SqlType::Composite;
        assert!(!fk.is_valid());
    }

    #[test]
    fn test_field_kinds() {
        let kinds: Vec<_> = Marker::schema().fields.iter().map(FieldSchema::kind).collect();
        assert_eq!(kinds, vec![EntityKind::Scalar, EntityKind::Scalar, EntityKind::Composite]);
        assert!(!kinds[1].is_nested());
        assert!(kinds[2].is_nested());
        assert!(EntityKind::of(SqlType::External).is_nested());
        assert!(!EntityKind::of(SqlType::CompositeVector).is_nested());
    }
}
