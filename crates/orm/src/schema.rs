//! Schema registration - compiles field declarations into SQL templates
//!
//! A record type is registered once, at program start, by describing its
//! fields to a [`SchemaBuilder`]. [`SchemaBuilder::build`] validates the
//! declaration and produces an immutable [`Schema`] holding the table name,
//! the ordered field list, the primary key and the precomputed
//! insert/update/delete/select statements. Every statement uses `?` for each
//! bound value; the executor translates it for the target database.
//!
//! ```rust,ignore
//! let schema = Schema::builder("User")
//!     .table("t_users")
//!     .field("id", Field::string().ddl("varchar(50)").primary_key().default_with(business_id))
//!     .field("name", Field::string().ddl("varchar(50)"))
//!     .field("create_at", Field::integer().default_with(unix_now))
//!     .build()?;
//!
//! assert_eq!(schema.delete_sql(), "DELETE FROM `t_users` WHERE `id`=?");
//! ```

use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::backends::{Row, SqlDialect};
use crate::error::{ModelError, ModelResult};
use crate::field::Field;

/// A registered field: the declaring attribute plus its resolved descriptor
#[derive(Debug, Clone)]
pub struct FieldMapping {
    attribute: String,
    field: Field,
}

impl FieldMapping {
    /// Name of the model attribute this field was declared on
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Resolved column name
    pub fn column(&self) -> &str {
        self.field.name().unwrap_or(&self.attribute)
    }

    pub fn field(&self) -> &Field {
        &self.field
    }
}

/// Collects field declarations for one record type
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    model_name: String,
    table_name: Option<String>,
    fields: Vec<(String, Field)>,
}

impl SchemaBuilder {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            table_name: None,
            fields: Vec::new(),
        }
    }

    /// Override the table name (defaults to the lower-cased model name)
    pub fn table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Declare a field; declaration order is preserved in generated SQL
    pub fn field(mut self, attribute: impl Into<String>, field: Field) -> Self {
        self.fields.push((attribute.into(), field));
        self
    }

    /// Validate the declaration and compile the SQL templates
    pub fn build(self) -> ModelResult<Schema> {
        let table_name = self
            .table_name
            .unwrap_or_else(|| self.model_name.to_lowercase());
        info!("Found model: {} (table: {})", self.model_name, table_name);

        let mut mappings = Vec::with_capacity(self.fields.len());
        let mut primary_key = None;
        for (index, (attribute, mut field)) in self.fields.into_iter().enumerate() {
            if mappings.iter().any(|m: &FieldMapping| m.attribute == attribute) {
                return Err(ModelError::Schema(format!(
                    "Duplicate field '{}' on model {}",
                    attribute, self.model_name
                )));
            }
            field.resolve_name(&attribute);
            let column = field.name().unwrap_or(attribute.as_str());
            if let Some(existing) = mappings.iter().find(|m: &&FieldMapping| m.column() == column) {
                return Err(ModelError::Schema(format!(
                    "Fields '{}' and '{}' both map to column '{}' on model {}",
                    existing.attribute, attribute, column, self.model_name
                )));
            }
            debug!("found mapping {}: {}", attribute, field);
            if field.is_primary_key() {
                if primary_key.is_some() {
                    return Err(ModelError::Schema(format!(
                        "Duplicate primary key for field: {}",
                        attribute
                    )));
                }
                primary_key = Some(index);
            }
            mappings.push(FieldMapping { attribute, field });
        }

        let primary_key = primary_key.ok_or_else(|| {
            ModelError::Schema(format!("Primary key not found for model {}", self.model_name))
        })?;

        Ok(Schema::compile(self.model_name, table_name, mappings, primary_key))
    }
}

/// Compiled, immutable metadata and SQL templates for one record type
#[derive(Debug, Clone)]
pub struct Schema {
    model_name: String,
    table_name: String,
    fields: Vec<FieldMapping>,
    primary_key: usize,
    insert_sql: String,
    update_sql: String,
    delete_sql: String,
    select_sql: String,
    count_sql: String,
}

impl Schema {
    /// Start declaring a record type
    pub fn builder(model_name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(model_name)
    }

    fn compile(
        model_name: String,
        table_name: String,
        fields: Vec<FieldMapping>,
        primary_key: usize,
    ) -> Self {
        let table = quote(&table_name);
        let pk = quote(fields[primary_key].column());
        let ordinary: Vec<String> = fields
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != primary_key)
            .map(|(_, mapping)| quote(mapping.column()))
            .collect();

        let mut insert_columns = ordinary.clone();
        insert_columns.push(pk.clone());
        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            insert_columns.join(", "),
            vec!["?"; insert_columns.len()].join(", ")
        );

        let assignments = if ordinary.is_empty() {
            format!("{}={}", pk, pk)
        } else {
            ordinary
                .iter()
                .map(|column| format!("{}=?", column))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let update_sql = format!("UPDATE {} SET {} WHERE {}=?", table, assignments, pk);

        let delete_sql = format!("DELETE FROM {} WHERE {}=?", table, pk);

        let mut projection = vec![pk];
        projection.extend(ordinary);
        let select_sql = format!("SELECT {} FROM {}", projection.join(", "), table);

        let count_sql = format!("SELECT COUNT(1) AS {} FROM {}", COUNT_ALIAS, table);

        Self {
            model_name,
            table_name,
            fields,
            primary_key,
            insert_sql,
            update_sql,
            delete_sql,
            select_sql,
            count_sql,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// All fields in declaration order, primary key included
    pub fn fields(&self) -> &[FieldMapping] {
        &self.fields
    }

    pub fn primary_key(&self) -> &FieldMapping {
        &self.fields[self.primary_key]
    }

    /// Every field except the primary key, in declaration order
    pub fn ordinary_fields(&self) -> impl Iterator<Item = &FieldMapping> {
        let primary_key = self.primary_key;
        self.fields
            .iter()
            .enumerate()
            .filter(move |(index, _)| *index != primary_key)
            .map(|(_, mapping)| mapping)
    }

    /// Look up a field by attribute name
    pub fn field(&self, attribute: &str) -> Option<&FieldMapping> {
        self.fields.iter().find(|mapping| mapping.attribute == attribute)
    }

    pub fn insert_sql(&self) -> &str {
        &self.insert_sql
    }

    pub fn update_sql(&self) -> &str {
        &self.update_sql
    }

    pub fn delete_sql(&self) -> &str {
        &self.delete_sql
    }

    /// Unfiltered projection of primary key plus every ordinary field
    pub fn select_sql(&self) -> &str {
        &self.select_sql
    }

    /// `SELECT COUNT(1) AS _num_ FROM <table>`
    pub fn count_sql(&self) -> &str {
        &self.count_sql
    }

    /// Select filtered by primary key
    pub fn find_sql(&self) -> String {
        format!("{} WHERE {}=?", self.select_sql, quote(self.primary_key().column()))
    }

    /// `DROP TABLE IF EXISTS` followed by `CREATE TABLE`, one statement each
    pub fn ddl_statements(&self) -> Vec<String> {
        self.ddl_statements_for(SqlDialect::MySQL)
    }

    /// DDL statements with column types adjusted for `dialect`
    pub fn ddl_statements_for(&self, dialect: SqlDialect) -> Vec<String> {
        let table = quote(&self.table_name);
        let mut create = vec![format!("CREATE TABLE {} (", table)];
        for mapping in &self.fields {
            let field = mapping.field();
            let mut line = format!(
                "  {} {}",
                quote(mapping.column()),
                dialect.column_type(field.column_type())
            );
            if !field.is_nullable() {
                line.push_str(" NOT NULL");
            }
            line.push(',');
            create.push(line);
        }
        create.push(format!("  PRIMARY KEY({})", quote(self.primary_key().column())));
        create.push(");".to_string());

        vec![
            format!("DROP TABLE IF EXISTS {};", table),
            create.join("\n"),
        ]
    }

    /// Full DDL script text
    pub fn ddl(&self) -> String {
        self.ddl_statements().join("\n")
    }

    /// Rename a column-keyed row to attribute keys, coercing each value to
    /// its field's family. Columns with no matching field are kept as-is.
    pub fn hydrate(&self, row: &Row) -> serde_json::Map<String, JsonValue> {
        let mut object = serde_json::Map::with_capacity(row.len());
        for (column, value) in row.iter() {
            match self.fields.iter().find(|mapping| mapping.column() == column) {
                Some(mapping) => {
                    let value = mapping.field().kind().coerce(value.to_json());
                    object.insert(mapping.attribute.clone(), value);
                }
                None => {
                    object.insert(column.to_string(), value.to_json());
                }
            }
        }
        object
    }
}

/// Alias of the aggregate column produced by [`Schema::count_sql`]
pub const COUNT_ALIAS: &str = "_num_";

fn quote(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}
