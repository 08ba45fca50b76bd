//! Table Mapper
//!
//! One `TableMapper` per mapped type: it owns the table name, the foreign key
//! linking it to a parent (for child tables) and one child mapper per vector
//! field, so the whole table tree of a type is described by its root mapper.

use crate::core::db::connection::Database;
use crate::core::{OrmError, Result};
use crate::reader::{Query, Reader};
use crate::schema::types::SqlValue;
use crate::schema::{Children, Entity, ForeignKeyConstraint, TableSchema};
use crate::sql;
use crate::writer::Writer;
use tracing::{debug, error};

#[derive(Debug, Clone)]
pub struct TableMapper {
    table_name: String,
    schema: &'static TableSchema,
    foreign_key: Option<ForeignKeyConstraint>,
    children: Vec<TableMapper>,
}

impl TableMapper {
    /// Builds the mapper tree of `T`.
    pub fn new<T: Entity>() -> Result<Self> {
        let schema = T::schema();
        TableMapper::build(schema.table.to_string(), schema, None)
    }

    fn build(
        table_name: String,
        schema: &'static TableSchema,
        foreign_key: Option<ForeignKeyConstraint>,
    ) -> Result<Self> {
        schema.validate()?;
        let mut mapper = TableMapper {
            table_name,
            schema,
            foreign_key,
            children: Vec::with_capacity(schema.vectors.len()),
        };
        if schema.vectors.is_empty() {
            return Ok(mapper);
        }

        let key = sql::key_column(schema).ok_or_else(|| {
            OrmError::Schema(format!("{} owns child tables but has no primary key", schema.display_name))
        })?;
        for vector in &schema.vectors {
            let element = vector.element();
            let child_table = format!("{}_{}", mapper.table_name, element.table);
            let foreign_key = ForeignKeyConstraint {
                child_table: child_table.clone(),
                parent_table: mapper.table_name.clone(),
                child_column: format!("{}_{}", mapper.table_name, key.name),
                parent_column: key.name.clone(),
                sql_type: key.sql_type,
            };
            if !foreign_key.is_valid() {
                return Err(OrmError::Schema(format!(
                    "cannot link {} to {}: key column is not scalar",
                    child_table, mapper.table_name
                )));
            }
            mapper
                .children
                .push(TableMapper::build(child_table, element, Some(foreign_key))?);
        }
        Ok(mapper)
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn schema(&self) -> &'static TableSchema {
        self.schema
    }

    pub fn foreign_key(&self) -> Option<&ForeignKeyConstraint> {
        self.foreign_key.as_ref()
    }

    /// Child mappers, one per vector field in declaration order
    pub fn children(&self) -> &[TableMapper] {
        &self.children
    }

    /// Child mapper of the vector field called `field`
    pub fn child(&self, field: &str) -> Option<&TableMapper> {
        self.schema
            .vectors
            .iter()
            .position(|v| v.name == field)
            .and_then(|index| self.children.get(index))
    }

    /// Creates this table, then every child table beneath it.
    pub fn create_table(&self, db: &Database) -> Result<()> {
        if !db.is_connected() {
            error!("Cannot create table {} without a connection", self.table_name);
            return Err(OrmError::NotConnected);
        }
        let sql = sql::create_table(&self.table_name, self.schema, self.foreign_key.as_ref());
        debug!("Creating table {}", self.table_name);
        db.exec(&sql)?;
        for child in &self.children {
            child.create_table(db)?;
        }
        Ok(())
    }

    /// Drops this table; rows in child tables go with it through the cascade.
    pub fn drop_table(&self, db: &Database) -> Result<()> {
        debug!("Dropping table {}", self.table_name);
        db.exec(&sql::drop_table(&self.table_name))
    }
}

impl<E: Entity> Children for Vec<E> {
    fn write(&self, db: &Database, mapper: &TableMapper, parent_key: &SqlValue) -> Result<usize> {
        if self.is_empty() {
            return Ok(0);
        }
        let mut writer = Writer::<E>::for_child(db, mapper, parent_key.clone());
        writer.insert_vector(self)
    }

    fn read(&mut self, db: &Database, mapper: &TableMapper, parent_key: &SqlValue) -> Result<usize> {
        self.clear();
        let mut reader = Reader::<E>::new(db, mapper);
        reader.prepare(Query::ForeignKey(parent_key.clone()))?;
        let fetched = reader.fetch_each(|element| {
            self.push(element);
            Ok(())
        });
        let finalized = reader.finalize();
        let count = fetched?;
        finalized?;
        Ok(count)
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::catalog;

    crate::orm_entity! {
        #[derive(Debug, Clone, Default, PartialEq)]
        struct Pin as "pin" {
            id: i64,
            name: String,
        }
    }

    crate::orm_entity! {
        #[derive(Debug, Clone, Default, PartialEq)]
        struct Net as "net" {
            id: i64,
        }
        children {
            pins: Vec<Pin>,
        }
    }

    crate::orm_entity! {
        #[derive(Debug, Clone, Default, PartialEq)]
        struct Cell as "cell" {
            name: String,
        }
        children {
            nets: Vec<Net>,
            pins: Vec<Pin>,
        }
    }

    fn connected() -> Database {
        let mut db = Database::new();
        db.connect(":memory:").unwrap();
        db
    }

    #[test]
    fn test_child_mappers_follow_vector_fields() {
        let mapper = TableMapper::new::<Cell>().unwrap();
        assert_eq!(mapper.table_name(), "cell");
        assert!(mapper.foreign_key().is_none());
        assert_eq!(mapper.children().len(), 2);

        let nets = mapper.child("nets").unwrap();
        assert_eq!(nets.table_name(), "cell_net");
        let fk = nets.foreign_key().unwrap();
        assert_eq!(fk.parent_table, "cell");
        assert_eq!(fk.parent_column, "name");
        assert_eq!(fk.child_column, "cell_name");
        assert_eq!(fk.sql_type, crate::SqlType::Text);

        let grandchild = &nets.children()[0];
        assert_eq!(grandchild.table_name(), "cell_net_pin");
        assert_eq!(grandchild.foreign_key().unwrap().child_column, "cell_net_id");
        assert!(mapper.child("missing").is_none());
    }

    #[test]
    fn test_create_table_cascades_to_children() {
        let db = connected();
        let mapper = TableMapper::new::<Cell>().unwrap();
        mapper.create_table(&db).unwrap();

        assert_eq!(
            catalog::table_names(&db).unwrap(),
            vec!["cell", "cell_net", "cell_net_pin", "cell_pin"]
        );
        let keys = catalog::foreign_keys(&db, "cell_net_pin").unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].referenced_table, "cell_net");
        assert_eq!(keys[0].from_column, "cell_net_id");
        assert_eq!(keys[0].to_column, "id");
        assert_eq!(keys[0].on_delete, "CASCADE");

        // creating again is a no-op
        mapper.create_table(&db).unwrap();
    }

    #[test]
    fn test_create_table_requires_connection() {
        let db = Database::new();
        let mapper = TableMapper::new::<Pin>().unwrap();
        assert!(matches!(mapper.create_table(&db), Err(OrmError::NotConnected)));
    }

    #[test]
    fn test_drop_table_does_not_recurse() {
        let db = connected();
        let mapper = TableMapper::new::<Net>().unwrap();
        mapper.create_table(&db).unwrap();
        mapper.drop_table(&db).unwrap();
        assert_eq!(catalog::table_names(&db).unwrap(), vec!["net_pin"]);
    }
}
