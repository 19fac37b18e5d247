//! Schema-related data models.
//!
//! This module defines the schema graph produced by introspection: tables own
//! their columns, columns carry an optional outbound foreign-key reference, and
//! relationships live in one flat list on [`SchemaMetadata`].

use serde::{Deserialize, Serialize};

/// Build the lookup key for a table: `schema.table`, or `table` without a schema.
///
/// Keys are compared exactly; case folding is left to the engine's collation.
pub fn table_key(schema: Option<&str>, name: &str) -> String {
    match schema {
        Some(schema) => format!("{}.{}", schema, name),
        None => name.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    /// Engine-native type name (e.g., `nvarchar`, `int`, `datetime2`)
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKey>,
    /// Default value with appropriate JSON type based on column data type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    /// Bytes, as reported by the catalog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u8>,
}

impl Column {
    /// Create a new column.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            primary_key: false,
            foreign_key: None,
            default_value: None,
            max_length: None,
            precision: None,
            scale: None,
        }
    }

    /// Set whether this is a primary key column.
    pub fn with_primary_key(mut self, is_pk: bool) -> Self {
        self.primary_key = is_pk;
        self
    }

    /// Attach an outbound foreign-key reference.
    pub fn with_foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_key = Some(fk);
        self
    }

    /// Set the default value (as JSON value).
    pub fn with_default(mut self, default_value: serde_json::Value) -> Self {
        self.default_value = Some(default_value);
        self
    }

    /// Set the maximum length in bytes.
    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Set numeric precision and scale.
    pub fn with_precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    pub referenced_table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_schema: Option<String>,
    pub referenced_column: String,
    pub constraint_name: String,
}

impl ForeignKey {
    /// Create a new foreign key reference.
    pub fn new(
        referenced_table: impl Into<String>,
        referenced_column: impl Into<String>,
        constraint_name: impl Into<String>,
    ) -> Self {
        Self {
            referenced_table: referenced_table.into(),
            referenced_schema: None,
            referenced_column: referenced_column.into(),
            constraint_name: constraint_name.into(),
        }
    }

    /// Set the referenced schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.referenced_schema = Some(schema.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub columns: Vec<Column>,
    /// Approximate, from catalog statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
}

impl Table {
    /// Create a new table without columns.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            columns: Vec::new(),
            row_count: None,
        }
    }

    /// Set the schema name.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Add a column definition.
    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Replace the column list.
    pub fn with_columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }

    /// Set the estimated row count.
    pub fn with_row_count(mut self, row_count: u64) -> Self {
        self.row_count = Some(row_count);
        self
    }

    /// Lookup key (`schema.table` or `table`).
    pub fn key(&self) -> String {
        table_key(self.schema.as_deref(), &self.name)
    }

    /// True if this table has the given identity.
    pub fn is(&self, name: &str, schema: Option<&str>) -> bool {
        self.name == name && self.schema.as_deref() == schema
    }

    /// Names of the primary-key columns, in column order.
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Cardinality of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipType {
    OneToOne,
    #[default]
    OneToMany,
    ManyToMany,
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OneToOne => write!(f, "one-to-one"),
            Self::OneToMany => write!(f, "one-to-many"),
            Self::ManyToMany => write!(f, "many-to-many"),
        }
    }
}

/// One foreign-key column pair. Composite constraints produce one entry per
/// column, all sharing `constraint_name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub from_table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_schema: Option<String>,
    pub from_column: String,
    pub to_table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_schema: Option<String>,
    pub to_column: String,
    pub constraint_name: String,
    #[serde(default)]
    pub relationship_type: RelationshipType,
}

impl Relationship {
    /// Key of the referencing (FK owner) table.
    pub fn from_key(&self) -> String {
        table_key(self.from_schema.as_deref(), &self.from_table)
    }

    /// Key of the referenced table.
    pub fn to_key(&self) -> String {
        table_key(self.to_schema.as_deref(), &self.to_table)
    }

    /// True if the referencing side is the given table.
    pub fn is_from(&self, table: &str, schema: Option<&str>) -> bool {
        self.from_table == table && self.from_schema.as_deref() == schema
    }

    /// True if the referenced side is the given table.
    pub fn is_to(&self, table: &str, schema: Option<&str>) -> bool {
        self.to_table == table && self.to_schema.as_deref() == schema
    }

    /// True if either side is the given table.
    pub fn touches(&self, table: &str, schema: Option<&str>) -> bool {
        self.is_from(table, schema) || self.is_to(table, schema)
    }
}

/// Aggregate root of an analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaMetadata {
    pub schemas: Vec<String>,
    pub tables: Vec<Table>,
    pub relationships: Vec<Relationship>,
}

impl SchemaMetadata {
    /// Find a table by identity.
    pub fn table(&self, name: &str, schema: Option<&str>) -> Option<&Table> {
        self.tables.iter().find(|t| t.is(name, schema))
    }

    /// Find a table by key (`schema.table` or `table`).
    pub fn table_by_key(&self, key: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.key() == key)
    }

    /// Relationships whose endpoints are not both present in `tables`.
    pub fn dangling_relationships(&self) -> Vec<&Relationship> {
        self.relationships
            .iter()
            .filter(|r| {
                self.table(&r.from_table, r.from_schema.as_deref()).is_none()
                    || self.table(&r.to_table, r.to_schema.as_deref()).is_none()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders_fk() -> Relationship {
        Relationship {
            from_table: "orders".to_string(),
            from_schema: Some("sales".to_string()),
            from_column: "customer_id".to_string(),
            to_table: "customers".to_string(),
            to_schema: Some("sales".to_string()),
            to_column: "id".to_string(),
            constraint_name: "FK_orders_customers".to_string(),
            relationship_type: RelationshipType::OneToMany,
        }
    }

    #[test]
    fn test_table_key() {
        assert_eq!(table_key(Some("sales"), "orders"), "sales.orders");
        assert_eq!(table_key(None, "orders"), "orders");
        assert_eq!(Table::new("orders").with_schema("sales").key(), "sales.orders");
    }

    #[test]
    fn test_table_builder_and_primary_key() {
        let table = Table::new("orders")
            .with_schema("sales")
            .with_column(Column::new("id", "int", false).with_primary_key(true))
            .with_column(Column::new("customer_id", "int", false))
            .with_row_count(25);

        assert_eq!(table.primary_key(), vec!["id"]);
        assert_eq!(table.row_count, Some(25));
        assert!(table.is("orders", Some("sales")));
        assert!(!table.is("orders", None));
        assert!(!table.is("Orders", Some("sales")));
    }

    #[test]
    fn test_column_serializes_camel_case_with_type() {
        let column = Column::new("customer_id", "int", false)
            .with_foreign_key(ForeignKey::new("customers", "id", "FK_c").with_schema("sales"));
        let json = serde_json::to_value(&column).unwrap();
        assert_eq!(json["type"], "int");
        assert_eq!(json["primaryKey"], false);
        assert_eq!(json["foreignKey"]["referencedTable"], "customers");
        assert_eq!(json["foreignKey"]["referencedSchema"], "sales");
        assert!(json.get("maxLength").is_none());
        assert!(json.get("defaultValue").is_none());
    }

    #[test]
    fn test_relationship_type_wire_names() {
        let json = serde_json::to_value(orders_fk()).unwrap();
        assert_eq!(json["relationshipType"], "one-to-many");
        assert_eq!(RelationshipType::ManyToMany.to_string(), "many-to-many");
    }

    #[test]
    fn test_relationship_identity_helpers() {
        let rel = orders_fk();
        assert_eq!(rel.from_key(), "sales.orders");
        assert_eq!(rel.to_key(), "sales.customers");
        assert!(rel.is_from("orders", Some("sales")));
        assert!(rel.is_to("customers", Some("sales")));
        assert!(rel.touches("customers", Some("sales")));
        assert!(!rel.touches("customers", None));
    }

    #[test]
    fn test_dangling_relationships() {
        let metadata = SchemaMetadata {
            schemas: vec!["sales".to_string()],
            tables: vec![Table::new("orders").with_schema("sales")],
            relationships: vec![orders_fk()],
        };
        assert_eq!(metadata.dangling_relationships().len(), 1);
        assert!(metadata.table_by_key("sales.orders").is_some());
        assert!(metadata.table_by_key("sales.customers").is_none());
    }

    #[test]
    fn test_metadata_round_trips_through_json() {
        let metadata = SchemaMetadata {
            schemas: vec!["sales".to_string()],
            tables: vec![
                Table::new("orders")
                    .with_schema("sales")
                    .with_column(Column::new("id", "int", false).with_primary_key(true)),
            ],
            relationships: vec![orders_fk()],
        };
        let json = serde_json::to_string(&metadata).unwrap();
        let back: SchemaMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, metadata);
    }
}
