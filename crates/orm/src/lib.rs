//! # minorm: a minimal async ORM
//!
//! Declare a record type once as a set of typed fields, get its
//! insert/update/delete/select statements compiled up front, and run them
//! against a bounded connection pool with async CRUD methods.
//!
//! MySQL is the primary target; PostgreSQL and SQLite are served by the
//! same pool through sqlx's `Any` driver, with `?` placeholders and
//! backtick-quoted identifiers translated per backend.

pub mod backends;
pub mod database;
pub mod error;
pub mod executor;
pub mod field;
pub mod model;
pub mod models;
pub mod query;
pub mod schema;
pub mod transaction;


// Re-export core traits and types
pub use backends::{DatabaseBackendType, DatabaseValue, Row, SqlDialect};
pub use database::*;
pub use error::*;
pub use executor::{execute, select};
pub use field::{Field, FieldDefault, FieldKind};
pub use model::Model;
pub use query::{FindOptions, Limit};
pub use schema::{FieldMapping, Schema, SchemaBuilder, COUNT_ALIAS};
pub use transaction::{with_transaction, Transaction};
