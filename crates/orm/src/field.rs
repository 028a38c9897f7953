//! Field descriptors - typed column metadata
//!
//! A [`Field`] describes one column: its SQL type, whether it is the primary
//! key, and how a value is produced when the instance leaves it unset. The
//! five constructors mirror the supported column families:
//!
//! | constructor        | SQL type      | default |
//! |--------------------|---------------|---------|
//! | [`Field::integer`] | `bigint`      | `0`     |
//! | [`Field::string`]  | `varchar(32)` | none    |
//! | [`Field::boolean`] | `boolean`     | `false` |
//! | [`Field::float`]   | `real`        | `0.0`   |
//! | [`Field::text`]    | `text`        | none    |

use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::backends::DatabaseValue;

/// Column family of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    String,
    Boolean,
    Float,
    Text,
}

impl FieldKind {
    /// Column type used when the declaration does not override it
    pub fn default_column_type(&self) -> &'static str {
        match self {
            FieldKind::Integer => "bigint",
            FieldKind::String => "varchar(32)",
            FieldKind::Boolean => "boolean",
            FieldKind::Float => "real",
            FieldKind::Text => "text",
        }
    }

    /// Coerce a value read back from the driver into this family's JSON shape.
    ///
    /// Drivers without a native boolean hand back `0`/`1`; integer columns
    /// may come back as floats from aggregate-heavy backends.
    pub fn coerce(&self, value: JsonValue) -> JsonValue {
        match (self, value) {
            (FieldKind::Boolean, JsonValue::Number(n)) => {
                JsonValue::Bool(n.as_f64().map_or(false, |v| v != 0.0))
            }
            (FieldKind::Integer, JsonValue::Number(n)) if n.as_i64().is_none() => n
                .as_f64()
                .filter(|v| v.fract() == 0.0)
                .map(|v| JsonValue::from(v as i64))
                .unwrap_or(JsonValue::Number(n)),
            (FieldKind::Integer, JsonValue::Bool(b)) => JsonValue::from(i64::from(b)),
            (_, other) => other,
        }
    }

    /// Convert an instance's JSON value into a bindable database value
    pub fn to_database_value(&self, value: &JsonValue) -> DatabaseValue {
        match (self, value) {
            (FieldKind::Boolean, JsonValue::Number(n)) => {
                DatabaseValue::Bool(n.as_f64().map_or(false, |v| v != 0.0))
            }
            (FieldKind::Float, JsonValue::Number(n)) => {
                n.as_f64().map_or(DatabaseValue::Null, DatabaseValue::Float64)
            }
            (FieldKind::String | FieldKind::Text, JsonValue::Number(n)) => {
                DatabaseValue::String(n.to_string())
            }
            (_, other) => DatabaseValue::from_json(other.clone()),
        }
    }
}

/// Zero-argument default provider, invoked afresh on every access
pub type DefaultProvider = Arc<dyn Fn() -> DatabaseValue + Send + Sync>;

/// How a field obtains a value when the instance leaves it unset
#[derive(Clone)]
pub enum FieldDefault {
    None,
    Value(DatabaseValue),
    Provider(DefaultProvider),
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDefault::None => write!(f, "None"),
            FieldDefault::Value(value) => f.debug_tuple("Value").field(value).finish(),
            FieldDefault::Provider(_) => write!(f, "Provider(<fn>)"),
        }
    }
}

/// Column metadata for one model attribute
#[derive(Debug, Clone)]
pub struct Field {
    name: Option<String>,
    kind: FieldKind,
    column_type: String,
    primary_key: bool,
    default: FieldDefault,
    nullable: bool,
}

impl Field {
    fn new(kind: FieldKind, default: FieldDefault) -> Self {
        Self {
            name: None,
            kind,
            column_type: kind.default_column_type().to_string(),
            primary_key: false,
            default,
            nullable: false,
        }
    }

    /// `bigint` column, default `0`
    pub fn integer() -> Self {
        Self::new(FieldKind::Integer, FieldDefault::Value(DatabaseValue::Int64(0)))
    }

    /// `varchar(32)` column, no default; widen with [`Field::ddl`]
    pub fn string() -> Self {
        Self::new(FieldKind::String, FieldDefault::None)
    }

    /// `boolean` column, default `false`
    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean, FieldDefault::Value(DatabaseValue::Bool(false)))
    }

    /// `real` column, default `0.0`
    pub fn float() -> Self {
        Self::new(FieldKind::Float, FieldDefault::Value(DatabaseValue::Float64(0.0)))
    }

    /// `text` column, no default
    pub fn text() -> Self {
        Self::new(FieldKind::Text, FieldDefault::None)
    }

    /// Use an explicit column name instead of the declaring attribute's name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Replace the column type with a caller-supplied DDL fragment
    pub fn ddl(mut self, column_type: impl Into<String>) -> Self {
        self.column_type = column_type.into();
        self
    }

    /// Mark this field as the table's primary key
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Use a literal default value
    pub fn default_value(mut self, value: impl Into<DatabaseValue>) -> Self {
        self.default = FieldDefault::Value(value.into());
        self
    }

    /// Use a provider invoked every time a default is needed
    pub fn default_with<F, V>(mut self, provider: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<DatabaseValue>,
    {
        self.default = FieldDefault::Provider(Arc::new(move || provider().into()));
        self
    }

    /// Drop any default
    pub fn no_default(mut self) -> Self {
        self.default = FieldDefault::None;
        self
    }

    /// Column name, if resolved
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn column_type(&self) -> &str {
        &self.column_type
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn default(&self) -> &FieldDefault {
        &self.default
    }

    /// The literal default, or a fresh result of the provider.
    ///
    /// Providers are not memoized: two calls may return different values.
    pub fn effective_default(&self) -> Option<DatabaseValue> {
        match &self.default {
            FieldDefault::None => None,
            FieldDefault::Value(DatabaseValue::Null) => None,
            FieldDefault::Value(value) => Some(value.clone()),
            FieldDefault::Provider(provider) => match provider() {
                DatabaseValue::Null => None,
                value => Some(value),
            },
        }
    }

    /// Fill in the column name from the declaring attribute if unset
    pub(crate) fn resolve_name(&mut self, attribute: &str) {
        if self.name.is_none() {
            self.name = Some(attribute.to_string());
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{:?}Field, {}:{}>",
            self.kind,
            self.column_type,
            self.name.as_deref().unwrap_or("?")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    #[test]
    fn test_variant_defaults() {
        assert_eq!(Field::integer().column_type(), "bigint");
        assert_eq!(Field::integer().effective_default(), Some(DatabaseValue::Int64(0)));
        assert_eq!(Field::string().column_type(), "varchar(32)");
        assert_eq!(Field::string().effective_default(), None);
        assert_eq!(Field::boolean().column_type(), "boolean");
        assert_eq!(Field::boolean().effective_default(), Some(DatabaseValue::Bool(false)));
        assert_eq!(Field::float().column_type(), "real");
        assert_eq!(Field::float().effective_default(), Some(DatabaseValue::Float64(0.0)));
        assert_eq!(Field::text().column_type(), "text");
        assert_eq!(Field::text().effective_default(), None);
    }

    #[test]
    fn test_no_variant_is_nullable() {
        for field in [Field::integer(), Field::string(), Field::boolean(), Field::float(), Field::text()] {
            assert!(!field.is_nullable());
            assert!(!field.is_primary_key());
        }
    }

    #[test]
    fn test_ddl_override() {
        let field = Field::string().ddl("varchar(255)");
        assert_eq!(field.column_type(), "varchar(255)");
        assert_eq!(field.kind(), FieldKind::String);
    }

    #[test]
    fn test_provider_is_invoked_on_every_access() {
        let counter = Arc::new(AtomicI64::new(0));
        let seen = counter.clone();
        let field = Field::integer().default_with(move || seen.fetch_add(1, Ordering::SeqCst) + 1);

        assert_eq!(field.effective_default(), Some(DatabaseValue::Int64(1)));
        assert_eq!(field.effective_default(), Some(DatabaseValue::Int64(2)));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_name_resolution_keeps_explicit_name() {
        let mut explicit = Field::string().named("user_name");
        explicit.resolve_name("name");
        assert_eq!(explicit.name(), Some("user_name"));

        let mut implicit = Field::string();
        assert_eq!(implicit.name(), None);
        implicit.resolve_name("name");
        assert_eq!(implicit.name(), Some("name"));
    }

    #[test]
    fn test_boolean_coercion() {
        assert_eq!(FieldKind::Boolean.coerce(serde_json::json!(1)), serde_json::json!(true));
        assert_eq!(FieldKind::Boolean.coerce(serde_json::json!(0)), serde_json::json!(false));
        assert_eq!(FieldKind::Integer.coerce(serde_json::json!(3.0)), serde_json::json!(3));
        assert_eq!(FieldKind::Text.coerce(serde_json::json!("x")), serde_json::json!("x"));
    }

    #[test]
    fn test_display() {
        let mut field = Field::string().ddl("varchar(50)");
        field.resolve_name("email");
        assert_eq!(field.to_string(), "<StringField, varchar(50):email>");
    }
}
