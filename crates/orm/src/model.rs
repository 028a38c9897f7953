//! Base Model System - Core trait and CRUD operations for database records
//!
//! A record type is an ordinary serde struct whose fields are `Option<T>`
//! (unset means "use the field default"). Implementing [`Model`] means
//! pointing at the type's compiled [`Schema`]; every operation is a default
//! method built on that schema's templates and the query executor.
//!
//! ```rust,ignore
//! let mut user = User { name: Some("vic".into()), ..Default::default() };
//! user.save(&pool).await?;
//! let found = User::find(&pool, user.id.clone()).await?;
//! ```

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info, warn};

use crate::backends::{DatabaseValue, Row};
use crate::database::ConnectionPool;
use crate::error::{ModelError, ModelResult};
use crate::executor::{execute, select};
use crate::query::{compose_count, FindOptions};
use crate::schema::{FieldMapping, Schema, COUNT_ALIAS};

/// Trait for database records with standard ORM operations
pub trait Model: Serialize + DeserializeOwned + Send + Sync + Debug {
    /// Compiled schema for this record type, registered once at start-up
    fn schema() -> &'static Schema;

    /// Get the table name for this model
    fn table_name() -> &'static str {
        Self::schema().table_name()
    }

    /// Build an instance from a column-keyed row
    fn from_row(row: &Row) -> ModelResult<Self> {
        let schema = Self::schema();
        serde_json::from_value(JsonValue::Object(schema.hydrate(row))).map_err(|e| {
            ModelError::Serialization(format!("Failed to hydrate {}: {}", schema.model_name(), e))
        })
    }

    /// Current attribute values keyed by attribute name
    fn to_fields(&self) -> ModelResult<Map<String, JsonValue>> {
        match serde_json::to_value(self)? {
            JsonValue::Object(fields) => Ok(fields),
            other => Err(ModelError::Serialization(format!(
                "{} must serialize to an object, got {}",
                Self::schema().model_name(),
                other
            ))),
        }
    }

    /// The instance's primary key value, or `MissingPrimaryKey` if unset
    fn primary_key_value(&self) -> ModelResult<DatabaseValue> {
        let fields = self.to_fields()?;
        match bind_value(&fields, Self::schema().primary_key()) {
            DatabaseValue::Null => Err(ModelError::MissingPrimaryKey),
            value => Ok(value),
        }
    }

    /// Find a record by primary key. An absent row is `Ok(None)`; a null or
    /// empty key returns `Ok(None)` without querying.
    async fn find<K>(pool: &ConnectionPool, primary_key: K) -> ModelResult<Option<Self>>
    where
        K: Into<DatabaseValue> + Send,
    {
        let primary_key = primary_key.into();
        if primary_key.is_null() || primary_key.as_str() == Some("") {
            debug!("find on {} with empty primary key", Self::table_name());
            return Ok(None);
        }

        let schema = Self::schema();
        let rows = select(pool, &schema.find_sql(), &[primary_key], Some(1)).await?;
        rows.first().map(Self::from_row).transpose()
    }

    /// Find a record by primary key or fail with `NotFound`
    async fn find_or_fail<K>(pool: &ConnectionPool, primary_key: K) -> ModelResult<Self>
    where
        K: Into<DatabaseValue> + Send,
    {
        Self::find(pool, primary_key)
            .await?
            .ok_or_else(|| ModelError::NotFound(Self::table_name().to_string()))
    }

    /// Find every record matching `options`, in result order
    async fn find_all(pool: &ConnectionPool, options: FindOptions) -> ModelResult<Vec<Self>> {
        let (sql, args) = options.compose(Self::schema(), pool.dialect())?;
        let rows = select(pool, &sql, &args, None).await?;
        rows.iter().map(Self::from_row).collect()
    }

    /// `COUNT(1)` over the table with an optional `WHERE` body. `None` only
    /// if the aggregate yields no row.
    async fn get_count(
        pool: &ConnectionPool,
        where_clause: Option<&str>,
        args: &[DatabaseValue],
    ) -> ModelResult<Option<i64>> {
        let sql = compose_count(Self::schema(), where_clause);
        let rows = select(pool, &sql, args, Some(1)).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get(COUNT_ALIAS).or_else(|| row.get_by_index(0)))
            .and_then(DatabaseValue::as_i64))
    }

    /// Insert this record. Unset fields take their defaults, which are
    /// written back into the instance before the insert runs. Returns the
    /// affected-row count; anything other than 1 is logged, not raised.
    async fn save(&mut self, pool: &ConnectionPool) -> ModelResult<u64> {
        let schema = Self::schema();
        let mut fields = self.to_fields()?;

        let mut args = Vec::with_capacity(schema.fields().len());
        for mapping in schema.ordinary_fields().chain(std::iter::once(schema.primary_key())) {
            args.push(value_or_default(&mut fields, mapping));
        }
        *self = serde_json::from_value(JsonValue::Object(fields))?;

        let rows = execute(pool, schema.insert_sql(), &args, true).await?;
        if rows != 1 {
            warn!("failed to insert record into {}: affected rows: {}", schema.table_name(), rows);
        }
        Ok(rows)
    }

    /// Update every ordinary field by primary key. Values are taken as-is;
    /// defaults are not applied.
    async fn modify(&self, pool: &ConnectionPool) -> ModelResult<u64> {
        let schema = Self::schema();
        let fields = self.to_fields()?;

        let args: Vec<DatabaseValue> = schema
            .ordinary_fields()
            .chain(std::iter::once(schema.primary_key()))
            .map(|mapping| bind_value(&fields, mapping))
            .collect();

        let rows = execute(pool, schema.update_sql(), &args, true).await?;
        if rows != 1 {
            warn!("failed to update {} by primary key: affected rows: {}", schema.table_name(), rows);
        }
        Ok(rows)
    }

    /// Delete this record by primary key
    async fn remove(&self, pool: &ConnectionPool) -> ModelResult<u64> {
        let schema = Self::schema();
        let fields = self.to_fields()?;
        let args = [bind_value(&fields, schema.primary_key())];

        let rows = execute(pool, schema.delete_sql(), &args, true).await?;
        if rows != 1 {
            warn!("failed to remove {} by primary key: affected rows: {}", schema.table_name(), rows);
        }
        Ok(rows)
    }

    /// Reload this record's fields from the database
    async fn refresh(&mut self, pool: &ConnectionPool) -> ModelResult<()> {
        let primary_key = self.primary_key_value()?;
        *self = Self::find_or_fail(pool, primary_key).await?;
        Ok(())
    }

    /// Drop and recreate this record's table
    async fn create_table(pool: &ConnectionPool) -> ModelResult<()> {
        let schema = Self::schema();
        for statement in schema.ddl_statements_for(pool.dialect()) {
            execute(pool, &statement, &[], true).await?;
        }
        info!("Created table {}", schema.table_name());
        Ok(())
    }
}

/// Bindable value of one field, `Null` if unset
fn bind_value(fields: &Map<String, JsonValue>, mapping: &FieldMapping) -> DatabaseValue {
    match fields.get(mapping.attribute()) {
        Some(value) => mapping.field().kind().to_database_value(value),
        None => DatabaseValue::Null,
    }
}

/// Bindable value of one field, materializing its default into `fields`
/// when unset
fn value_or_default(fields: &mut Map<String, JsonValue>, mapping: &FieldMapping) -> DatabaseValue {
    let value = bind_value(fields, mapping);
    if !value.is_null() {
        return value;
    }

    match mapping.field().effective_default() {
        Some(default) => {
            debug!("using default value for {}: {}", mapping.attribute(), default);
            let json = mapping.field().kind().coerce(default.to_json());
            fields.insert(mapping.attribute().to_string(), json);
            default
        }
        None => DatabaseValue::Null,
    }
}
