//! Core Database Value Types
//!
//! Backend-neutral values for parameter binding, the row type returned by
//! `select`, and SQL dialect translation of the `?` placeholder convention.

use std::borrow::Cow;

use serde_json::Value as JsonValue;

/// Database value enumeration for type-safe parameter binding
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    String(String),
}

impl DatabaseValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DatabaseValue::Int64(i) => Some(*i),
            DatabaseValue::Bool(b) => Some(i64::from(*b)),
            DatabaseValue::Float64(f) if f.fract() == 0.0 => Some(*f as i64),
            DatabaseValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> JsonValue {
        match self {
            DatabaseValue::Null => JsonValue::Null,
            DatabaseValue::Bool(b) => JsonValue::Bool(*b),
            DatabaseValue::Int64(i) => JsonValue::Number(serde_json::Number::from(*i)),
            DatabaseValue::Float64(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DatabaseValue::String(s) => JsonValue::String(s.clone()),
        }
    }

    /// Create DatabaseValue from JSON value
    ///
    /// Arrays and objects are stored as their JSON text.
    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => DatabaseValue::Null,
            JsonValue::Bool(b) => DatabaseValue::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    DatabaseValue::Int64(i)
                } else if let Some(f) = n.as_f64() {
                    DatabaseValue::Float64(f)
                } else {
                    DatabaseValue::Null
                }
            }
            JsonValue::String(s) => DatabaseValue::String(s),
            other => DatabaseValue::String(other.to_string()),
        }
    }
}

impl std::fmt::Display for DatabaseValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseValue::Null => write!(f, "NULL"),
            DatabaseValue::Bool(b) => write!(f, "{}", b),
            DatabaseValue::Int64(i) => write!(f, "{}", i),
            DatabaseValue::Float64(v) => write!(f, "{}", v),
            DatabaseValue::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Int64(i64::from(value))
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<u32> for DatabaseValue {
    fn from(value: u32) -> Self {
        DatabaseValue::Int64(i64::from(value))
    }
}

impl From<f32> for DatabaseValue {
    fn from(value: f32) -> Self {
        DatabaseValue::Float64(f64::from(value))
    }
}

impl From<f64> for DatabaseValue {
    fn from(value: f64) -> Self {
        DatabaseValue::Float64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl From<&String> for DatabaseValue {
    fn from(value: &String) -> Self {
        DatabaseValue::String(value.clone())
    }
}

impl From<JsonValue> for DatabaseValue {
    fn from(value: JsonValue) -> Self {
        DatabaseValue::from_json(value)
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// One result row: column names and values in projection order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<DatabaseValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column; a repeated name shadows the earlier one on lookup
    pub fn push(&mut self, column: impl Into<String>, value: DatabaseValue) {
        self.columns.push(column.into());
        self.values.push(value);
    }

    /// Get a column value by name
    pub fn get(&self, column: &str) -> Option<&DatabaseValue> {
        self.columns
            .iter()
            .rposition(|name| name == column)
            .map(|index| &self.values[index])
    }

    /// Get a column value by index
    pub fn get_by_index(&self, index: usize) -> Option<&DatabaseValue> {
        self.values.get(index)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DatabaseValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Convert row to a JSON object keyed by column name
    pub fn to_json_map(&self) -> serde_json::Map<String, JsonValue> {
        self.iter()
            .map(|(name, value)| (name.to_string(), value.to_json()))
            .collect()
    }

}

impl<K: Into<String>> FromIterator<(K, DatabaseValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, DatabaseValue)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.push(column, value);
        }
        row
    }
}

/// SQL dialect enumeration for generating database-specific SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl SqlDialect {
    /// Get the parameter placeholder style for this dialect
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index + 1),
            SqlDialect::MySQL | SqlDialect::SQLite => "?".to_string(),
        }
    }

    /// Get the quote character for identifiers in this dialect
    pub fn identifier_quote(&self) -> char {
        match self {
            SqlDialect::PostgreSQL => '"',
            SqlDialect::MySQL | SqlDialect::SQLite => '`',
        }
    }

    /// `LIMIT` clause for an (offset, count) pair, placeholders in that order
    pub fn limit_offset_clause(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL => "OFFSET ? LIMIT ?",
            SqlDialect::MySQL | SqlDialect::SQLite => "LIMIT ?, ?",
        }
    }

    /// Column type to declare in this dialect's DDL.
    ///
    /// sqlx's `Any` driver cannot decode SQLite's `BOOLEAN` affinity, so
    /// boolean columns are declared as `integer` there and read back as 0/1.
    pub fn column_type<'a>(&self, declared: &'a str) -> Cow<'a, str> {
        match self {
            SqlDialect::SQLite
                if declared.eq_ignore_ascii_case("boolean") || declared.eq_ignore_ascii_case("bool") =>
            {
                Cow::Borrowed("integer")
            }
            _ => Cow::Borrowed(declared),
        }
    }

    /// Rewrite `?` placeholders and backtick-quoted identifiers into this
    /// dialect's native syntax. Text inside single-quoted literals is left
    /// untouched.
    pub fn translate<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        let quote = self.identifier_quote();
        if self.parameter_placeholder(0) == "?" && quote == '`' {
            return Cow::Borrowed(sql);
        }

        let mut out = String::with_capacity(sql.len() + 8);
        let mut in_literal = false;
        let mut index = 0;
        for ch in sql.chars() {
            match ch {
                '\'' => {
                    in_literal = !in_literal;
                    out.push(ch);
                }
                '?' if !in_literal => {
                    out.push_str(&self.parameter_placeholder(index));
                    index += 1;
                }
                '`' if !in_literal => out.push(quote),
                _ => out.push(ch),
            }
        }
        Cow::Owned(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mysql_translation_is_identity() {
        let sql = "SELECT `id`, `name` FROM `t_users` WHERE `id`=?";
        let translated = SqlDialect::MySQL.translate(sql);
        assert!(matches!(translated, Cow::Borrowed(_)));
        assert_eq!(translated, sql);
        assert_eq!(SqlDialect::SQLite.translate(sql), sql);
    }

    #[test]
    fn test_postgres_translation() {
        let sql = "UPDATE `t_users` SET `name`=?, `email`=? WHERE `id`=?";
        assert_eq!(
            SqlDialect::PostgreSQL.translate(sql),
            "UPDATE \"t_users\" SET \"name\"=$1, \"email\"=$2 WHERE \"id\"=$3"
        );
    }

    #[test]
    fn test_translation_skips_string_literals() {
        let sql = "SELECT `id` FROM `t` WHERE `name`='who?' AND `id`=?";
        assert_eq!(
            SqlDialect::PostgreSQL.translate(sql),
            "SELECT \"id\" FROM \"t\" WHERE \"name\"='who?' AND \"id\"=$1"
        );
    }

    #[test]
    fn test_sqlite_boolean_column_type() {
        assert_eq!(SqlDialect::SQLite.column_type("boolean"), "integer");
        assert_eq!(SqlDialect::SQLite.column_type("BOOL"), "integer");
        assert_eq!(SqlDialect::SQLite.column_type("varchar(32)"), "varchar(32)");
        assert_eq!(SqlDialect::MySQL.column_type("boolean"), "boolean");
        assert_eq!(SqlDialect::PostgreSQL.column_type("boolean"), "boolean");
    }

    #[test]
    fn test_value_json_conversion() {
        assert_eq!(DatabaseValue::from_json(serde_json::json!(3)), DatabaseValue::Int64(3));
        assert_eq!(DatabaseValue::from_json(serde_json::json!(1.5)), DatabaseValue::Float64(1.5));
        assert_eq!(DatabaseValue::from_json(serde_json::json!(null)), DatabaseValue::Null);
        assert_eq!(
            DatabaseValue::from_json(serde_json::json!(["a"])),
            DatabaseValue::String("[\"a\"]".to_string())
        );
        assert_eq!(DatabaseValue::Bool(true).to_json(), serde_json::json!(true));
        assert_eq!(DatabaseValue::from(Some("vic")), DatabaseValue::String("vic".to_string()));
        assert_eq!(DatabaseValue::from(None::<i64>), DatabaseValue::Null);
    }

    #[test]
    fn test_row_lookup() {
        let row: Row = vec![
            ("id", DatabaseValue::from("abc")),
            ("_num_", DatabaseValue::Int64(3)),
        ]
        .into_iter()
        .collect();

        assert_eq!(row.len(), 2);
        assert_eq!(row.get("_num_").and_then(DatabaseValue::as_i64), Some(3));
        assert_eq!(row.get_by_index(0).and_then(DatabaseValue::as_str), Some("abc"));
        assert!(row.get("missing").is_none());
        assert_eq!(row.to_json_map()["id"], serde_json::json!("abc"));
    }
}
