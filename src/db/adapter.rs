//! Engine-agnostic adapter contract.
//!
//! Every engine exposes the same capability set through [`DatabaseAdapter`].
//! Callers hold an [`AnyAdapter`] built by [`create_adapter`] and never name a
//! concrete engine type.

use crate::db::sqlserver::SqlServerAdapter;
use crate::error::{DbError, DbResult};
use crate::impl_adapter_dispatch;
use crate::models::{
    Column, DatabaseConfig, DatabaseType, NamedParam, QueryOptions, QueryResult, Relationship,
    SchemaMetadata, Table, table_key,
};
use std::future::Future;
use tracing::{debug, info, warn};

/// Engine-specific gateway used by the analyzer and the request service.
///
/// An adapter exclusively owns one connection, so every operation takes
/// `&mut self`. Operations other than `connect`, `disconnect` and
/// `test_connection` fail with a connection error until `connect` succeeds.
pub trait DatabaseAdapter: Send {
    /// Engine served by this adapter.
    fn database_type(&self) -> DatabaseType;

    /// Open the connection. Calling it while connected is a no-op.
    fn connect(&mut self) -> impl Future<Output = DbResult<()>> + Send;

    /// Release the connection. A no-op when not connected.
    fn disconnect(&mut self) -> impl Future<Output = DbResult<()>> + Send;

    /// Round-trip `SELECT 1`, connecting first if needed. Never errors.
    fn test_connection(&mut self) -> impl Future<Output = bool> + Send;

    /// Distinct names of schemas owning at least one table, sorted.
    fn get_schemas(&mut self) -> impl Future<Output = DbResult<Vec<String>>> + Send;

    /// Tables (without columns), optionally restricted to one schema.
    fn get_tables(
        &mut self,
        schema: Option<&str>,
    ) -> impl Future<Output = DbResult<Vec<Table>>> + Send;

    /// Column definitions of one table in ordinal order.
    fn get_columns(
        &mut self,
        table: &str,
        schema: Option<&str>,
    ) -> impl Future<Output = DbResult<Vec<Column>>> + Send;

    /// Every foreign-key column pair in the database.
    fn get_relationships(&mut self) -> impl Future<Output = DbResult<Vec<Relationship>>> + Send;

    /// Run a read-only statement with named parameters.
    fn execute_query(
        &mut self,
        sql: &str,
        params: &[NamedParam],
    ) -> impl Future<Output = DbResult<QueryResult>> + Send;

    /// Filtered, sorted, paginated rows of one table plus the total match count.
    fn get_table_data(
        &mut self,
        table: &str,
        schema: Option<&str>,
        options: &QueryOptions,
    ) -> impl Future<Output = DbResult<QueryResult>> + Send;

    /// Full introspection of every schema, table, column and relationship.
    ///
    /// A schema whose table list cannot be read is skipped, and a table whose
    /// columns cannot be read is kept with no columns. Both are logged.
    fn get_schema_metadata(&mut self) -> impl Future<Output = DbResult<SchemaMetadata>> + Send {
        async move {
            let schemas = self.get_schemas().await?;
            info!(count = schemas.len(), "Found schemas");

            let relationships = self.get_relationships().await?;
            info!(count = relationships.len(), "Found relationships");

            let mut tables = Vec::new();
            for schema in &schemas {
                let schema_tables = match self.get_tables(Some(schema)).await {
                    Ok(t) => t,
                    Err(e) => {
                        warn!(schema = %schema, error = %e, "Skipping schema, table listing failed");
                        continue;
                    }
                };
                debug!(schema = %schema, count = schema_tables.len(), "Found tables");

                for mut table in schema_tables {
                    let key = table_key(table.schema.as_deref(), &table.name);
                    match self.get_columns(&table.name, table.schema.as_deref()).await {
                        Ok(columns) => {
                            debug!(table = %key, columns = columns.len(), "Fetched columns");
                            table.columns = columns;
                        }
                        Err(e) => {
                            let err = DbError::introspection(e.to_string(), &key);
                            warn!(error = %err, "Continuing with empty column list");
                            table.columns = Vec::new();
                        }
                    }
                    tables.push(table);
                }
            }

            info!(tables = tables.len(), "Schema metadata extraction complete");
            Ok(SchemaMetadata {
                schemas,
                tables,
                relationships,
            })
        }
    }
}

/// Any supported engine adapter.
#[derive(Debug)]
pub enum AnyAdapter {
    SqlServer(SqlServerAdapter),
}

/// Build the adapter for an engine.
///
/// PostgreSQL and MySQL are recognised but have no adapter yet.
pub fn create_adapter(db_type: DatabaseType, config: DatabaseConfig) -> DbResult<AnyAdapter> {
    match db_type {
        DatabaseType::SqlServer => Ok(AnyAdapter::SqlServer(SqlServerAdapter::new(config))),
        DatabaseType::PostgreSQL | DatabaseType::MySQL => {
            Err(DbError::unsupported_engine(db_type.as_str()))
        }
    }
}

impl DatabaseAdapter for AnyAdapter {
    fn database_type(&self) -> DatabaseType {
        impl_adapter_dispatch!(self, a => a.database_type())
    }

    async fn connect(&mut self) -> DbResult<()> {
        impl_adapter_dispatch!(self, a => a.connect().await)
    }

    async fn disconnect(&mut self) -> DbResult<()> {
        impl_adapter_dispatch!(self, a => a.disconnect().await)
    }

    async fn test_connection(&mut self) -> bool {
        impl_adapter_dispatch!(self, a => a.test_connection().await)
    }

    async fn get_schemas(&mut self) -> DbResult<Vec<String>> {
        impl_adapter_dispatch!(self, a => a.get_schemas().await)
    }

    async fn get_tables(&mut self, schema: Option<&str>) -> DbResult<Vec<Table>> {
        impl_adapter_dispatch!(self, a => a.get_tables(schema).await)
    }

    async fn get_columns(&mut self, table: &str, schema: Option<&str>) -> DbResult<Vec<Column>> {
        impl_adapter_dispatch!(self, a => a.get_columns(table, schema).await)
    }

    async fn get_relationships(&mut self) -> DbResult<Vec<Relationship>> {
        impl_adapter_dispatch!(self, a => a.get_relationships().await)
    }

    async fn execute_query(&mut self, sql: &str, params: &[NamedParam]) -> DbResult<QueryResult> {
        impl_adapter_dispatch!(self, a => a.execute_query(sql, params).await)
    }

    async fn get_table_data(
        &mut self,
        table: &str,
        schema: Option<&str>,
        options: &QueryOptions,
    ) -> DbResult<QueryResult> {
        impl_adapter_dispatch!(self, a => a.get_table_data(table, schema, options).await)
    }

    async fn get_schema_metadata(&mut self) -> DbResult<SchemaMetadata> {
        impl_adapter_dispatch!(self, a => a.get_schema_metadata().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DatabaseConfig {
        DatabaseConfig::new("localhost", "shop", "sa", "pw")
    }

    #[test]
    fn test_create_sqlserver_adapter() {
        let adapter = create_adapter(DatabaseType::SqlServer, config()).unwrap();
        assert_eq!(adapter.database_type(), DatabaseType::SqlServer);
    }

    #[test]
    fn test_other_engines_unsupported() {
        for db_type in [DatabaseType::PostgreSQL, DatabaseType::MySQL] {
            let err = create_adapter(db_type, config()).unwrap_err();
            assert!(matches!(err, DbError::UnsupportedEngine { .. }));
        }
        let err = create_adapter(DatabaseType::MySQL, config()).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported database type: mysql");
    }

    #[tokio::test]
    async fn test_operations_before_connect_fail() {
        let mut adapter = create_adapter(DatabaseType::SqlServer, config()).unwrap();
        let err = adapter.get_schemas().await.unwrap_err();
        assert!(matches!(err, DbError::Connection { .. }));
        assert!(adapter.get_relationships().await.is_err());
    }

    #[tokio::test]
    async fn test_disconnect_without_connect_is_noop() {
        let mut adapter = create_adapter(DatabaseType::SqlServer, config()).unwrap();
        assert!(adapter.disconnect().await.is_ok());
        assert!(adapter.disconnect().await.is_ok());
    }
}
