/// # Test Utilities Module
///
/// Testing infrastructure for sqlorm with isolated databases and error
/// assertion helpers.
///
/// This module provides:
/// - Connected in-memory database fixtures with mapped tables
/// - Shortcuts for storing and loading whole batches
/// - OrmError-specific testing helpers

use crate::core::db::catalog;
use crate::core::db::connection::Database;
use crate::core::Result;
use crate::mapper::TableMapper;
use crate::reader::{Query, Reader};
use crate::schema::Entity;
use crate::writer::{Operation, Writer};

/// Isolated database test fixture
pub struct DatabaseFixture {
    pub name: String,
    pub db: Database,
}

impl DatabaseFixture {
    /// Create a new connected in-memory database
    pub fn new(name: &str) -> Result<Self> {
        let mut db = Database::new();
        db.connect(":memory:")?;
        Ok(DatabaseFixture {
            name: name.to_string(),
            db,
        })
    }

    /// Build the mapper tree of `T` and create all of its tables
    pub fn map<T: Entity>(&self) -> Result<TableMapper> {
        let mapper = TableMapper::new::<T>()?;
        mapper.create_table(&self.db)?;
        Ok(mapper)
    }

    /// Insert every object one by one through a single prepared statement,
    /// returning the row count reported for each
    pub fn store<T: Entity>(&self, mapper: &TableMapper, objects: &[T]) -> Result<Vec<usize>> {
        let mut writer = Writer::<T>::new(&self.db, mapper);
        writer.prepare(Operation::Insert)?;
        let mut counts = Vec::with_capacity(objects.len());
        for object in objects {
            match writer.insert(object) {
                Ok(rows) => counts.push(rows),
                Err(e) => {
                    let _ = writer.finalize();
                    return Err(e);
                }
            }
        }
        writer.finalize()?;
        Ok(counts)
    }

    /// Read back every row matching `query`
    pub fn load<T: Entity>(&self, mapper: &TableMapper, query: Query) -> Result<Vec<T>> {
        let mut reader = Reader::<T>::new(&self.db, mapper);
        reader.prepare(query)?;
        let fetched = reader.fetch_all();
        reader.finalize()?;
        fetched
    }

    pub fn row_count(&self, table: &str) -> Result<i64> {
        catalog::row_count(&self.db, table)
    }
}

/// Error testing utilities specific to OrmError patterns
pub mod error_testing {
    /// Test that a function returns a specific error type
    pub fn assert_error_type<T, E>(
        result: &std::result::Result<T, E>,
        expected_variant: fn(&E) -> bool,
        message: &str,
    ) {
        if let Err(ref err) = result {
            assert!(expected_variant(err), "{}", message);
        } else {
            panic!("Expected error but got Ok: {}", message);
        }
    }

    /// Test that the error message mentions `expected_message_fragment`
    pub fn assert_error_mentions<T, E>(
        result: &std::result::Result<T, E>,
        expected_message_fragment: &str,
        context: &str,
    ) where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => panic!("Expected OrmError but got Ok in {}", context),
            Err(e) => {
                let error_str = e.to_string();
                assert!(
                    error_str
                        .to_lowercase()
                        .contains(&expected_message_fragment.to_lowercase()),
                    "Expected '{}' in error message '{}' context: {}",
                    expected_message_fragment,
                    error_str,
                    context
                );
            }
        }
    }
}

/// Asserts that an expression fails with the given `OrmError` variant
#[macro_export]
macro_rules! assert_orm_error {
    ($result:expr, $variant:ident, $context:expr) => {
        match $result {
            Err($crate::OrmError::$variant { .. }) => {}
            Ok(_) => panic!("Expected {} error but got Ok in {}", stringify!($variant), $context),
            Err(other) => panic!(
                "Expected {} but got {:?} in {}",
                stringify!($variant),
                other,
                $context
            ),
        }
    };
}
