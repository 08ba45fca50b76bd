//! Mappings for ecosystem types that are not records themselves.

use crate::core::{OrmError, Result};
use crate::schema::types::{Column, ColumnMut, Field, Shadowed, Slot, SqlType, SqlValue, Value};
use chrono::{Datelike, NaiveDate};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use uuid::Uuid;

crate::orm_entity! {
    /// Column projection of a calendar date.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct DateShadow as "date" [keyless] {
        pub year: i32,
        pub month: u8,
        pub day: u8,
    }
}

impl Shadowed for NaiveDate {
    type Shadow = DateShadow;

    fn to_shadow(&self) -> DateShadow {
        DateShadow {
            year: self.year(),
            month: self.month() as u8,
            day: self.day() as u8,
        }
    }

    fn from_shadow(shadow: DateShadow) -> Result<Self> {
        NaiveDate::from_ymd_opt(shadow.year, u32::from(shadow.month), u32::from(shadow.day))
            .ok_or_else(|| {
                OrmError::Conversion(format!(
                    "{}-{}-{} is not a calendar date",
                    shadow.year, shadow.month, shadow.day
                ))
            })
    }
}

crate::orm_external!(NaiveDate);

/// UUIDs are stored as hyphenated text.
impl Value for Uuid {
    fn column(&self) -> Column<'_> {
        Column::Scalar(SqlValue::Text(self.hyphenated().to_string()))
    }

    fn column_mut(&mut self) -> ColumnMut<'_> {
        ColumnMut::Scalar(self)
    }
}

impl Slot for Uuid {
    fn set(&mut self, value: ValueRef<'_>) -> FromSqlResult<()> {
        let text = String::column_result(value)?;
        *self = Uuid::parse_str(&text).map_err(|e| FromSqlError::Other(Box::new(e)))?;
        Ok(())
    }

    fn reset(&mut self) {
        *self = Uuid::nil();
    }
}

impl Field for Uuid {
    const SQL_TYPE: SqlType = SqlType::Text;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntityKind, Record};

    #[test]
    fn test_date_projects_through_shadow() {
        assert_eq!(<NaiveDate as Field>::SQL_TYPE, SqlType::External);
        let nested = <NaiveDate as Field>::nested().unwrap();
        assert_eq!(nested.kind, EntityKind::External);
        let columns: Vec<_> = nested.fields.iter().map(|f| f.column).collect();
        assert_eq!(columns, vec!["year", "month", "day"]);
    }

    #[test]
    fn test_date_shadow_conversions() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let shadow = date.to_shadow();
        assert_eq!(shadow, DateShadow { year: 2024, month: 2, day: 29 });
        assert_eq!(NaiveDate::from_shadow(shadow).unwrap(), date);

        let invalid = DateShadow { year: 2023, month: 2, day: 29 };
        assert!(matches!(NaiveDate::from_shadow(invalid), Err(OrmError::Conversion(_))));
    }

    #[test]
    fn test_date_column_is_a_materialized_shadow() {
        let date = NaiveDate::from_ymd_opt(1999, 12, 31).unwrap();
        match date.column() {
            Column::External(shadow) => assert_eq!(shadow.values().len(), 3),
            _ => panic!("expected external column"),
        }
    }

    #[test]
    fn test_uuid_is_text() {
        let id = Uuid::new_v4();
        match id.column() {
            Column::Scalar(SqlValue::Text(text)) => assert_eq!(Uuid::parse_str(&text).unwrap(), id),
            _ => panic!("expected text column"),
        }

        let mut slot = Uuid::nil();
        assert!(Slot::set(&mut slot, ValueRef::Text(b"not-a-uuid")).is_err());
    }
}
