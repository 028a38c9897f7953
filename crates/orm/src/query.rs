//! Find options - filtering, ordering and pagination for `find_all`
//!
//! [`FindOptions`] appends an optional `WHERE`, `ORDER BY` and `LIMIT` to a
//! schema's select template. A [`Limit`] is either a row count or an
//! `(offset, count)` pair; any other shape is rejected with
//! `InvalidArgument` before a query is issued.

use std::fmt;

use serde_json::Value as JsonValue;
use tracing::warn;

use crate::backends::{DatabaseValue, SqlDialect};
use crate::error::{ModelError, ModelResult};
use crate::schema::Schema;

/// Pagination bound for a select
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// At most `n` rows; `Count(0)` means no limit
    Count(u64),
    /// Skip `offset` rows, then return at most `count`
    Range { offset: u64, count: u64 },
}

impl Limit {
    /// SQL fragment and bound arguments for this limit, if any
    pub fn clause(&self, dialect: SqlDialect) -> Option<(&'static str, Vec<DatabaseValue>)> {
        match *self {
            Limit::Count(0) => None,
            Limit::Count(count) => Some(("LIMIT ?", vec![to_value(count)])),
            Limit::Range { offset, count } => Some((
                dialect.limit_offset_clause(),
                vec![to_value(offset), to_value(count)],
            )),
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Count(count) => write!(f, "{}", count),
            Limit::Range { offset, count } => write!(f, "({}, {})", offset, count),
        }
    }
}

fn to_value(n: u64) -> DatabaseValue {
    DatabaseValue::Int64(i64::try_from(n).unwrap_or(i64::MAX))
}

fn invalid_limit(shape: impl fmt::Display) -> ModelError {
    ModelError::InvalidArgument(format!("Invalid limit value: {}", shape))
}

fn non_negative(value: i64, shape: &dyn fmt::Debug) -> ModelResult<u64> {
    u64::try_from(value).map_err(|_| invalid_limit(format!("{:?}", shape)))
}

macro_rules! impl_unsigned_limit {
    ($($ty:ty),*) => {$(
        impl From<$ty> for Limit {
            fn from(count: $ty) -> Self {
                Limit::Count(count as u64)
            }
        }

        impl From<($ty, $ty)> for Limit {
            fn from((offset, count): ($ty, $ty)) -> Self {
                Limit::Range { offset: offset as u64, count: count as u64 }
            }
        }
    )*};
}

macro_rules! impl_signed_limit {
    ($($ty:ty),*) => {$(
        impl TryFrom<$ty> for Limit {
            type Error = ModelError;

            fn try_from(count: $ty) -> ModelResult<Self> {
                Ok(Limit::Count(non_negative(count as i64, &count)?))
            }
        }

        impl TryFrom<($ty, $ty)> for Limit {
            type Error = ModelError;

            fn try_from(pair: ($ty, $ty)) -> ModelResult<Self> {
                Ok(Limit::Range {
                    offset: non_negative(pair.0 as i64, &pair)?,
                    count: non_negative(pair.1 as i64, &pair)?,
                })
            }
        }
    )*};
}

impl_unsigned_limit!(u32, u64, usize);
impl_signed_limit!(i32, i64);

impl TryFrom<&[i64]> for Limit {
    type Error = ModelError;

    fn try_from(values: &[i64]) -> ModelResult<Self> {
        match *values {
            [offset, count] => Limit::try_from((offset, count)),
            _ => Err(invalid_limit(format!("{:?}", values))),
        }
    }
}

impl TryFrom<Vec<i64>> for Limit {
    type Error = ModelError;

    fn try_from(values: Vec<i64>) -> ModelResult<Self> {
        Limit::try_from(values.as_slice())
    }
}

/// Strings are never a valid limit shape
impl TryFrom<&str> for Limit {
    type Error = ModelError;

    fn try_from(value: &str) -> ModelResult<Self> {
        Err(invalid_limit(format!("{:?}", value)))
    }
}

/// Accepts a non-negative integer or a two-element array of them
impl TryFrom<JsonValue> for Limit {
    type Error = ModelError;

    fn try_from(value: JsonValue) -> ModelResult<Self> {
        match &value {
            JsonValue::Number(n) => match n.as_u64() {
                Some(count) => Ok(Limit::Count(count)),
                None => Err(invalid_limit(&value)),
            },
            JsonValue::Array(items) if items.len() == 2 => {
                match (items[0].as_u64(), items[1].as_u64()) {
                    (Some(offset), Some(count)) => Ok(Limit::Range { offset, count }),
                    _ => Err(invalid_limit(&value)),
                }
            }
            _ => Err(invalid_limit(&value)),
        }
    }
}

/// Filter, ordering and limit for `find_all`
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    where_clause: Option<String>,
    args: Vec<DatabaseValue>,
    order_by: Option<String>,
    limit: Option<ModelResult<Limit>>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw `WHERE` body with `?` placeholders
    pub fn where_clause(mut self, clause: impl Into<String>) -> Self {
        self.where_clause = Some(clause.into());
        self
    }

    /// `WHERE` body plus its arguments in one call
    pub fn filter<I, V>(self, clause: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<DatabaseValue>,
    {
        self.where_clause(clause).args(args)
    }

    /// Bind one more positional argument
    pub fn arg(mut self, value: impl Into<DatabaseValue>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn args<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<DatabaseValue>,
    {
        self.args.extend(values.into_iter().map(Into::into));
        self
    }

    /// Raw `ORDER BY` body, e.g. `"created_at desc"`
    pub fn order_by(mut self, order: impl Into<String>) -> Self {
        self.order_by = Some(order.into());
        self
    }

    /// A count or `(offset, count)`; a malformed shape surfaces as
    /// `InvalidArgument` when the query is composed
    pub fn limit<L>(mut self, limit: L) -> Self
    where
        L: TryInto<Limit>,
        L::Error: Into<ModelError>,
    {
        self.limit = Some(limit.try_into().map_err(Into::into));
        self
    }

    /// Compose the select statement and its arguments
    pub fn compose(&self, schema: &Schema, dialect: SqlDialect) -> ModelResult<(String, Vec<DatabaseValue>)> {
        let mut sql = schema.select_sql().to_string();
        let mut args = self.args.clone();

        if let Some(clause) = &self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(clause);
        }
        if let Some(order) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }

        match &self.limit {
            Some(Ok(limit)) => {
                if let Some((clause, limit_args)) = limit.clause(dialect) {
                    sql.push(' ');
                    sql.push_str(clause);
                    args.extend(limit_args);
                }
            }
            Some(Err(e)) => {
                warn!("Rejecting find on {}: {}", schema.table_name(), e);
                return Err(e.clone());
            }
            None => {}
        }

        Ok((sql, args))
    }
}

/// Count statement with an optional `WHERE` body
pub fn compose_count(schema: &Schema, where_clause: Option<&str>) -> String {
    match where_clause {
        Some(clause) => format!("{} WHERE {}", schema.count_sql(), clause),
        None => schema.count_sql().to_string(),
    }
}
