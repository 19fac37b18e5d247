//! SQL Server adapter.
//!
//! Introspection reads the `sys.*` catalog views; row reads go through the
//! query translator. All statements, including the catalog ones, bind their
//! values as parameters.
//!
//! # Architecture
//!
//! Catalog SQL lives in the `queries` submodule as constants. The adapter
//! owns at most one TDS client at a time and drops it on `disconnect`.

use crate::db::adapter::DatabaseAdapter;
use crate::db::params::prepare;
use crate::db::query_builder::build_table_query;
use crate::db::sql_validator::validate_readonly;
use crate::db::types::{decode_row, parse_default_value};
use crate::error::{DbError, DbResult};
use crate::models::{
    Column, DatabaseConfig, DatabaseType, ForeignKey, NamedParam, QueryOptions, QueryParam,
    QueryResult, Relationship, RelationshipType, Table, table_key,
};
use futures_util::TryStreamExt;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

type TdsClient = Client<Compat<TcpStream>>;

// =============================================================================
// SQL Query Templates
// =============================================================================

mod queries {
    pub const TEST_CONNECTION: &str = "SELECT 1 AS test";

    pub const LIST_SCHEMAS: &str = r#"
        SELECT DISTINCT SCHEMA_NAME(schema_id) AS schema_name
        FROM sys.tables
        ORDER BY schema_name
        "#;

    /// Row count is the catalog's partition statistics for the heap or
    /// clustered index, not a live count.
    pub const LIST_TABLES: &str = r#"
        SELECT
            t.name AS table_name,
            SCHEMA_NAME(t.schema_id) AS schema_name,
            (SELECT SUM(p.rows)
             FROM sys.partitions p
             WHERE p.object_id = t.object_id AND p.index_id IN (0, 1)) AS row_count
        FROM sys.tables t
        WHERE (@schema IS NULL OR SCHEMA_NAME(t.schema_id) = @schema)
        ORDER BY schema_name, table_name
        "#;

    pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            c.name AS column_name,
            ty.name AS type_name,
            c.is_nullable,
            c.max_length,
            c.precision,
            c.scale,
            OBJECT_DEFINITION(c.default_object_id) AS column_default,
            CAST(CASE WHEN EXISTS (
                SELECT 1
                FROM sys.indexes i
                INNER JOIN sys.index_columns ic
                    ON i.object_id = ic.object_id AND i.index_id = ic.index_id
                WHERE i.is_primary_key = 1
                  AND ic.object_id = c.object_id
                  AND ic.column_id = c.column_id
            ) THEN 1 ELSE 0 END AS bit) AS is_primary_key
        FROM sys.columns c
        INNER JOIN sys.types ty ON c.user_type_id = ty.user_type_id
        INNER JOIN sys.tables tab ON c.object_id = tab.object_id
        WHERE tab.name = @table
          AND SCHEMA_NAME(tab.schema_id) = COALESCE(@schema, SCHEMA_NAME())
        ORDER BY c.column_id
        "#;

    pub const TABLE_FOREIGN_KEYS: &str = r#"
        SELECT
            fk.name AS constraint_name,
            COL_NAME(fkc.parent_object_id, fkc.parent_column_id) AS column_name,
            OBJECT_NAME(fk.referenced_object_id) AS referenced_table_name,
            COL_NAME(fkc.referenced_object_id, fkc.referenced_column_id) AS referenced_column_name,
            OBJECT_SCHEMA_NAME(fk.referenced_object_id) AS referenced_schema_name
        FROM sys.foreign_keys fk
        INNER JOIN sys.foreign_key_columns fkc ON fk.object_id = fkc.constraint_object_id
        WHERE OBJECT_NAME(fk.parent_object_id) = @table
          AND OBJECT_SCHEMA_NAME(fk.parent_object_id) = COALESCE(@schema, SCHEMA_NAME())
        ORDER BY fk.name, fkc.constraint_column_id
        "#;

    pub const ALL_FOREIGN_KEYS: &str = r#"
        SELECT
            fk.name AS constraint_name,
            OBJECT_SCHEMA_NAME(fk.parent_object_id) AS from_schema,
            OBJECT_NAME(fk.parent_object_id) AS from_table,
            COL_NAME(fkc.parent_object_id, fkc.parent_column_id) AS from_column,
            OBJECT_SCHEMA_NAME(fk.referenced_object_id) AS to_schema,
            OBJECT_NAME(fk.referenced_object_id) AS to_table,
            COL_NAME(fkc.referenced_object_id, fkc.referenced_column_id) AS to_column
        FROM sys.foreign_keys fk
        INNER JOIN sys.foreign_key_columns fkc ON fk.object_id = fkc.constraint_object_id
        ORDER BY from_schema, from_table, constraint_name, fkc.constraint_column_id
        "#;
}

// =============================================================================
// Row helpers
// =============================================================================

fn column_error(column: &str, err: tiberius::error::Error) -> DbError {
    DbError::internal(format!("Failed to read catalog column '{}': {}", column, err))
}

fn get_opt_string(row: &Row, column: &str) -> DbResult<Option<String>> {
    row.try_get::<&str, _>(column)
        .map(|v| v.map(str::to_string))
        .map_err(|e| column_error(column, e))
}

fn get_string(row: &Row, column: &str) -> DbResult<String> {
    get_opt_string(row, column)?
        .ok_or_else(|| DbError::internal(format!("Catalog column '{}' was NULL", column)))
}

fn get_bool(row: &Row, column: &str) -> DbResult<bool> {
    row.try_get::<bool, _>(column)
        .map(|v| v.unwrap_or(false))
        .map_err(|e| column_error(column, e))
}

fn nonzero_i16(row: &Row, column: &str) -> DbResult<Option<u32>> {
    let value = row
        .try_get::<i16, _>(column)
        .map_err(|e| column_error(column, e))?;
    Ok(value.filter(|v| *v > 0).map(|v| v as u32))
}

fn nonzero_u8(row: &Row, column: &str) -> DbResult<Option<u8>> {
    let value = row
        .try_get::<u8, _>(column)
        .map_err(|e| column_error(column, e))?;
    Ok(value.filter(|v| *v > 0))
}

/// Anything that fails while opening the connection is a connection failure.
fn as_connection_error(err: DbError) -> DbError {
    match err {
        DbError::Connection { .. } | DbError::Validation { .. } => err,
        other => DbError::connection(other.to_string(), "Check the server, database and credentials"),
    }
}

// =============================================================================
// Adapter
// =============================================================================

/// SQL Server adapter backed by one TDS connection.
pub struct SqlServerAdapter {
    config: DatabaseConfig,
    client: Option<TdsClient>,
}

impl SqlServerAdapter {
    /// Create a disconnected adapter.
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            client: None,
        }
    }

    /// True once `connect` succeeded and until `disconnect`.
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Driver configuration for the current connection settings.
    fn tds_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.config.server);
        config.port(self.config.port_or_default());
        config.database(&self.config.database);
        config.authentication(AuthMethod::sql_server(
            &self.config.username,
            &self.config.password,
        ));

        let options = &self.config.options;
        config.encryption(if options.encrypt {
            EncryptionLevel::Required
        } else {
            EncryptionLevel::Off
        });
        if options.trust_server_certificate {
            config.trust_cert();
        }
        if let Some(name) = &options.application_name {
            config.application_name(name);
        }
        config
    }

    /// Bound on the whole connect handshake. Zero means wait indefinitely.
    fn connect_timeout(&self) -> Option<Duration> {
        self.config
            .options
            .connect_timeout_secs
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }

    async fn open(&self) -> DbResult<TdsClient> {
        let config = self.tds_config();
        let tcp = TcpStream::connect(config.get_addr()).await?;
        tcp.set_nodelay(true)?;
        Ok(Client::connect(config, tcp.compat_write()).await?)
    }

    fn client(&mut self) -> DbResult<&mut TdsClient> {
        self.client.as_mut().ok_or_else(DbError::not_connected)
    }

    /// Run one statement and collect its rows.
    async fn fetch(&mut self, sql: &str, params: &[NamedParam]) -> DbResult<Vec<Row>> {
        let query = prepare(sql, params)?;
        let client = self.client()?;
        let rows = query
            .query(client)
            .await?
            .into_row_stream()
            .try_collect()
            .await?;
        Ok(rows)
    }

    fn table_params(table: &str, schema: Option<&str>) -> [NamedParam; 2] {
        [
            NamedParam::new("table", table),
            NamedParam::new(
                "schema",
                schema.map(QueryParam::from).unwrap_or(QueryParam::Null),
            ),
        ]
    }

    /// Outbound foreign keys of one table keyed by column.
    ///
    /// A column in several constraints gets the first constraint by name.
    async fn column_foreign_keys(
        &mut self,
        table: &str,
        schema: Option<&str>,
    ) -> DbResult<HashMap<String, ForeignKey>> {
        let rows = self
            .fetch(queries::TABLE_FOREIGN_KEYS, &Self::table_params(table, schema))
            .await?;

        let mut keys = HashMap::new();
        for row in &rows {
            let column = get_string(row, "column_name")?;
            if keys.contains_key(&column) {
                continue;
            }
            let mut fk = ForeignKey::new(
                get_string(row, "referenced_table_name")?,
                get_string(row, "referenced_column_name")?,
                get_string(row, "constraint_name")?,
            );
            if let Some(schema) = get_opt_string(row, "referenced_schema_name")? {
                fk = fk.with_schema(schema);
            }
            keys.insert(column, fk);
        }
        Ok(keys)
    }
}

impl std::fmt::Debug for SqlServerAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlServerAdapter")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl DatabaseAdapter for SqlServerAdapter {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::SqlServer
    }

    async fn connect(&mut self) -> DbResult<()> {
        if self.client.is_some() {
            return Ok(());
        }
        self.config.validate()?;

        let target = self.config.masked();
        info!(target = %target, "Connecting to SQL Server");

        let client = match self.connect_timeout() {
            Some(limit) => tokio::time::timeout(limit, self.open())
                .await
                .map_err(|_| {
                    DbError::connection(
                        format!("Connection to {} timed out after {}s", target, limit.as_secs()),
                        "Check that the server is reachable or raise connect_timeout",
                    )
                })?,
            None => self.open().await,
        }
        .map_err(as_connection_error)?;

        self.client = Some(client);
        info!(target = %target, "Connected");
        Ok(())
    }

    async fn disconnect(&mut self) -> DbResult<()> {
        if let Some(client) = self.client.take() {
            client.close().await?;
            debug!(target = %self.config.masked(), "Disconnected");
        }
        Ok(())
    }

    async fn test_connection(&mut self) -> bool {
        if self.client.is_none() {
            if let Err(e) = self.connect().await {
                warn!(error = %e, "Connection test failed");
                return false;
            }
        }
        match self.fetch(queries::TEST_CONNECTION, &[]).await {
            Ok(rows) => !rows.is_empty(),
            Err(e) => {
                warn!(error = %e, "Connection test query failed");
                false
            }
        }
    }

    async fn get_schemas(&mut self) -> DbResult<Vec<String>> {
        let rows = self.fetch(queries::LIST_SCHEMAS, &[]).await?;
        rows.iter().map(|row| get_string(row, "schema_name")).collect()
    }

    async fn get_tables(&mut self, schema: Option<&str>) -> DbResult<Vec<Table>> {
        let params = [NamedParam::new(
            "schema",
            schema.map(QueryParam::from).unwrap_or(QueryParam::Null),
        )];
        let rows = self.fetch(queries::LIST_TABLES, &params).await?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut table = Table::new(get_string(row, "table_name")?)
                .with_schema(get_string(row, "schema_name")?);
            let row_count = row
                .try_get::<i64, _>("row_count")
                .map_err(|e| column_error("row_count", e))?;
            if let Some(count) = row_count.and_then(|c| u64::try_from(c).ok()) {
                table = table.with_row_count(count);
            }
            tables.push(table);
        }
        Ok(tables)
    }

    async fn get_columns(&mut self, table: &str, schema: Option<&str>) -> DbResult<Vec<Column>> {
        let key = table_key(schema, table);
        let result: DbResult<Vec<Column>> = async {
            let rows = self
                .fetch(queries::DESCRIBE_COLUMNS, &Self::table_params(table, schema))
                .await?;
            let mut foreign_keys = self.column_foreign_keys(table, schema).await?;

            let mut columns = Vec::with_capacity(rows.len());
            for row in &rows {
                let name = get_string(row, "column_name")?;
                let data_type = get_string(row, "type_name")?;
                let mut column = Column::new(&name, &data_type, get_bool(row, "is_nullable")?)
                    .with_primary_key(get_bool(row, "is_primary_key")?);

                if let Some(fk) = foreign_keys.remove(&name) {
                    column = column.with_foreign_key(fk);
                }
                if let Some(default) = get_opt_string(row, "column_default")? {
                    column = column.with_default(parse_default_value(&default, &data_type));
                }
                column.max_length = nonzero_i16(row, "max_length")?;
                column.precision = nonzero_u8(row, "precision")?;
                column.scale = nonzero_u8(row, "scale")?;
                columns.push(column);
            }
            Ok(columns)
        }
        .await;

        if let Err(e) = &result {
            warn!(table = %key, error = %e, "Column introspection failed");
        }
        result
    }

    async fn get_relationships(&mut self) -> DbResult<Vec<Relationship>> {
        let rows = self.fetch(queries::ALL_FOREIGN_KEYS, &[]).await?;
        rows.iter()
            .map(|row| {
                Ok(Relationship {
                    from_table: get_string(row, "from_table")?,
                    from_schema: get_opt_string(row, "from_schema")?,
                    from_column: get_string(row, "from_column")?,
                    to_table: get_string(row, "to_table")?,
                    to_schema: get_opt_string(row, "to_schema")?,
                    to_column: get_string(row, "to_column")?,
                    constraint_name: get_string(row, "constraint_name")?,
                    relationship_type: RelationshipType::OneToMany,
                })
            })
            .collect()
    }

    async fn execute_query(&mut self, sql: &str, params: &[NamedParam]) -> DbResult<QueryResult> {
        validate_readonly(sql)?;
        let start = Instant::now();
        let rows = self.fetch(sql, params).await?;
        let rows = rows.into_iter().map(decode_row).collect::<DbResult<Vec<_>>>()?;
        debug!(
            rows = rows.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query executed"
        );
        Ok(QueryResult::from_rows(rows))
    }

    async fn get_table_data(
        &mut self,
        table: &str,
        schema: Option<&str>,
        options: &QueryOptions,
    ) -> DbResult<QueryResult> {
        let query = build_table_query(table, schema, options)?;
        let start = Instant::now();

        let count_rows = self.fetch(&query.count_sql, &query.params).await?;
        let total = match count_rows.first() {
            Some(row) => row
                .try_get::<i64, _>("total")
                .map_err(|e| column_error("total", e))?
                .unwrap_or(0),
            None => 0,
        };

        let columns = self.get_columns(table, schema).await?;

        let rows = self.fetch(&query.select_sql, &query.params).await?;
        let rows = rows.into_iter().map(decode_row).collect::<DbResult<Vec<_>>>()?;

        debug!(
            table = %table_key(schema, table),
            filters = options.filters.len(),
            sorts = options.sorts.len(),
            rows = rows.len(),
            total,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Table data fetched"
        );

        Ok(QueryResult {
            rows,
            columns,
            row_count: u64::try_from(total).unwrap_or(0),
        })
    }
}
