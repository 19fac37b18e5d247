//! In-memory adapter shared by the integration tests.

#![allow(dead_code)]

use db_browser::db::DatabaseAdapter;
use db_browser::db::query_builder::build_table_query;
use db_browser::error::{DbError, DbResult};
use db_browser::models::{
    Column, DatabaseType, ForeignKey, NamedParam, QueryOptions, QueryResult, Relationship,
    RelationshipType, Table, table_key,
};
use std::collections::HashSet;

/// Catalog served from memory. Tables hold their columns; `get_tables`
/// strips them the way a real catalog listing would.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    pub schemas: Vec<String>,
    pub tables: Vec<Table>,
    pub relationships: Vec<Relationship>,
    /// Table keys whose column introspection fails
    pub broken_tables: HashSet<String>,
    /// Schemas whose table listing fails
    pub broken_schemas: HashSet<String>,
    pub connected: bool,
    pub connects: usize,
    pub disconnects: usize,
    pub column_fetches: Vec<String>,
    pub last_statement: Option<String>,
}

impl MemoryAdapter {
    fn ensure_connected(&self) -> DbResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(DbError::not_connected())
        }
    }

    pub fn break_table(mut self, key: &str) -> Self {
        self.broken_tables.insert(key.to_string());
        self
    }

    pub fn break_schema(mut self, schema: &str) -> Self {
        self.broken_schemas.insert(schema.to_string());
        self
    }
}

impl DatabaseAdapter for MemoryAdapter {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::SqlServer
    }

    async fn connect(&mut self) -> DbResult<()> {
        if !self.connected {
            self.connected = true;
            self.connects += 1;
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> DbResult<()> {
        if self.connected {
            self.connected = false;
            self.disconnects += 1;
        }
        Ok(())
    }

    async fn test_connection(&mut self) -> bool {
        self.connected
    }

    async fn get_schemas(&mut self) -> DbResult<Vec<String>> {
        self.ensure_connected()?;
        Ok(self.schemas.clone())
    }

    async fn get_tables(&mut self, schema: Option<&str>) -> DbResult<Vec<Table>> {
        self.ensure_connected()?;
        if let Some(s) = schema {
            if self.broken_schemas.contains(s) {
                return Err(DbError::introspection("permission denied", s));
            }
        }
        Ok(self
            .tables
            .iter()
            .filter(|t| schema.is_none() || t.schema.as_deref() == schema)
            .map(|t| Table {
                columns: Vec::new(),
                ..t.clone()
            })
            .collect())
    }

    async fn get_columns(&mut self, table: &str, schema: Option<&str>) -> DbResult<Vec<Column>> {
        self.ensure_connected()?;
        let key = table_key(schema, table);
        self.column_fetches.push(key.clone());
        if self.broken_tables.contains(&key) {
            return Err(DbError::query(
                format!("The SELECT permission was denied on the object '{}'", table),
                Some(229),
                "",
            ));
        }
        self.tables
            .iter()
            .find(|t| t.is(table, schema))
            .map(|t| t.columns.clone())
            .ok_or_else(|| DbError::introspection("table not found", &key))
    }

    async fn get_relationships(&mut self) -> DbResult<Vec<Relationship>> {
        self.ensure_connected()?;
        Ok(self.relationships.clone())
    }

    async fn execute_query(&mut self, sql: &str, _params: &[NamedParam]) -> DbResult<QueryResult> {
        self.ensure_connected()?;
        self.last_statement = Some(sql.to_string());
        Ok(QueryResult::default())
    }

    async fn get_table_data(
        &mut self,
        table: &str,
        schema: Option<&str>,
        options: &QueryOptions,
    ) -> DbResult<QueryResult> {
        self.ensure_connected()?;
        let query = build_table_query(table, schema, options)?;
        self.last_statement = Some(query.select_sql);
        let columns = self.get_columns(table, schema).await?;
        Ok(QueryResult {
            rows: Vec::new(),
            columns,
            row_count: 0,
        })
    }
}

pub fn relationship(
    from: (&str, &str, &str),
    to: (&str, &str, &str),
    constraint: &str,
) -> Relationship {
    Relationship {
        from_schema: Some(from.0.to_string()),
        from_table: from.1.to_string(),
        from_column: from.2.to_string(),
        to_schema: Some(to.0.to_string()),
        to_table: to.1.to_string(),
        to_column: to.2.to_string(),
        constraint_name: constraint.to_string(),
        relationship_type: RelationshipType::OneToMany,
    }
}

/// `sales.orders` (id PK, customer_id FK to customers.id), `sales.customers`
/// (id PK) and `sales.legacy_blob` (payload).
pub fn sales_catalog() -> MemoryAdapter {
    let orders = Table::new("orders")
        .with_schema("sales")
        .with_row_count(25)
        .with_column(Column::new("id", "int", false).with_primary_key(true))
        .with_column(
            Column::new("customer_id", "int", false).with_foreign_key(
                ForeignKey::new("customers", "id", "FK_orders_customers").with_schema("sales"),
            ),
        )
        .with_column(Column::new("status", "nvarchar", true).with_max_length(40));
    let customers = Table::new("customers")
        .with_schema("sales")
        .with_column(Column::new("id", "int", false).with_primary_key(true))
        .with_column(Column::new("name", "nvarchar", false));
    let legacy = Table::new("legacy_blob")
        .with_schema("sales")
        .with_column(Column::new("payload", "varbinary", true));

    MemoryAdapter {
        schemas: vec!["sales".to_string()],
        tables: vec![orders, customers, legacy],
        relationships: vec![relationship(
            ("sales", "orders", "customer_id"),
            ("sales", "customers", "id"),
            "FK_orders_customers",
        )],
        ..MemoryAdapter::default()
    }
}

/// Two schemas with a cross-schema key: `sales.orders.customer_id` references
/// `crm.customers.id`, and `crm.contacts.customer_id` references it too.
pub fn two_schema_catalog() -> MemoryAdapter {
    let mut adapter = sales_catalog();
    adapter.schemas = vec!["crm".to_string(), "sales".to_string()];
    adapter.tables.push(
        Table::new("customers")
            .with_schema("crm")
            .with_column(Column::new("id", "int", false).with_primary_key(true)),
    );
    adapter.tables.push(
        Table::new("contacts")
            .with_schema("crm")
            .with_column(Column::new("customer_id", "int", false)),
    );
    adapter.relationships = vec![
        relationship(
            ("crm", "contacts", "customer_id"),
            ("crm", "customers", "id"),
            "FK_contacts_customers",
        ),
        relationship(
            ("sales", "orders", "customer_id"),
            ("crm", "customers", "id"),
            "FK_orders_crm_customers",
        ),
    ];
    adapter
}
