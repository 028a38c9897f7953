//! sqlx `Any` driver glue
//!
//! Binds [`DatabaseValue`] parameters onto `Any` queries and converts
//! `AnyRow`s back into backend-neutral [`Row`]s.

use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, Column, Row as SqlxRow};

use super::core::{DatabaseValue, Row};
use crate::error::{ModelError, OrmResult};

pub(crate) type AnyQuery<'q> = Query<'q, Any, AnyArguments<'q>>;

/// Bind a DatabaseValue to a sqlx query
pub(crate) fn bind_database_value<'q>(query: AnyQuery<'q>, value: &DatabaseValue) -> AnyQuery<'q> {
    match value {
        DatabaseValue::Null => query.bind(Option::<String>::None),
        DatabaseValue::Bool(b) => query.bind(*b),
        DatabaseValue::Int64(i) => query.bind(*i),
        DatabaseValue::Float64(f) => query.bind(*f),
        DatabaseValue::String(s) => query.bind(s.clone()),
    }
}

/// Build a query from translated SQL with every argument bound in order
pub(crate) fn build_query<'q>(sql: &'q str, args: &[DatabaseValue]) -> AnyQuery<'q> {
    args.iter()
        .fold(sqlx::query::<Any>(sql), bind_database_value)
}

/// Convert an `AnyRow` into a [`Row`], preserving column order
pub(crate) fn any_row_to_row(row: &AnyRow) -> OrmResult<Row> {
    let mut converted = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        converted.push(column.name(), any_value_to_database_value(row, index)?);
    }
    Ok(converted)
}

/// Convert an `Any` column value to DatabaseValue
///
/// The `Any` driver only decodes a handful of primitive types, and which one
/// a column maps to depends on the backend (a MySQL `boolean` is a tiny
/// integer, a SQLite `boolean` is a bool). Each candidate is tried in turn;
/// a NULL decodes successfully as the first candidate.
fn any_value_to_database_value(row: &AnyRow, index: usize) -> OrmResult<DatabaseValue> {
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return Ok(value.map_or(DatabaseValue::Null, DatabaseValue::Int64));
    }
    if let Ok(value) = row.try_get::<Option<i32>, _>(index) {
        return Ok(value.map_or(DatabaseValue::Null, |v| DatabaseValue::Int64(i64::from(v))));
    }
    if let Ok(value) = row.try_get::<Option<i16>, _>(index) {
        return Ok(value.map_or(DatabaseValue::Null, |v| DatabaseValue::Int64(i64::from(v))));
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(index) {
        return Ok(value.map_or(DatabaseValue::Null, DatabaseValue::Float64));
    }
    if let Ok(value) = row.try_get::<Option<f32>, _>(index) {
        return Ok(value.map_or(DatabaseValue::Null, |v| DatabaseValue::Float64(f64::from(v))));
    }
    if let Ok(value) = row.try_get::<Option<bool>, _>(index) {
        return Ok(value.map_or(DatabaseValue::Null, DatabaseValue::Bool));
    }
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return Ok(value.map_or(DatabaseValue::Null, DatabaseValue::String));
    }
    if let Ok(value) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return Ok(value.map_or(DatabaseValue::Null, |bytes| {
            DatabaseValue::String(String::from_utf8_lossy(&bytes).into_owned())
        }));
    }

    let name = row
        .columns()
        .get(index)
        .map(|column| column.name().to_string())
        .unwrap_or_else(|| index.to_string());
    Err(ModelError::Execution(format!(
        "Unsupported value type in column '{}'",
        name
    )))
}
