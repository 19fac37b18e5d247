//! Request-scoped browser operations.
//!
//! Every operation builds a fresh adapter, connects, does its work and
//! disconnects, also when the work fails. Adapters are never shared between
//! requests. The `*_with` variants run the same scoped flow on an
//! already-built adapter, so they can be driven by any [`DatabaseAdapter`].

use crate::annotate::{HttpAnnotator, SchemaAnnotator, annotate_schema};
use crate::db::{AnyAdapter, DatabaseAdapter, create_adapter};
use crate::error::{DbError, DbResult};
use crate::models::{
    DatabaseConfig, DatabaseType, QueryOptions, QueryResult, SchemaAnnotations, SchemaMetadata,
};
use crate::schema::SchemaAnalyzer;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Engine plus connection settings, the common part of every request.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectRequest {
    #[serde(rename = "type")]
    pub db_type: DatabaseType,
    pub config: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaRequest {
    #[serde(rename = "type")]
    pub db_type: DatabaseType,
    pub config: DatabaseConfig,
    #[serde(default)]
    pub api_key: Option<String>,
    /// `schema.table` or `table` keys
    #[serde(default)]
    pub selected_tables: Option<Vec<String>>,
    #[serde(default)]
    pub selected_schemas: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(rename = "type")]
    pub db_type: DatabaseType,
    pub config: DatabaseConfig,
    pub table: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub options: Option<QueryOptions>,
}

/// Table name entry for the selection screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableListing {
    pub schemas: Vec<String>,
    pub tables: Vec<TableSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaExtraction {
    pub metadata: SchemaMetadata,
    /// `null` when labeling was skipped, failed or timed out
    pub ai_analysis: Option<SchemaAnnotations>,
}

/// Disconnect, logging instead of raising failures.
async fn release<A: DatabaseAdapter>(adapter: &mut A) {
    if let Err(e) = adapter.disconnect().await {
        warn!(error = %e, "Error disconnecting");
    } else {
        debug!("Database disconnected");
    }
}

/// Release the adapter, then hand back the outcome of the work done on it.
///
/// Callers run their work in an async block that borrows the adapter, so the
/// release happens on the error path too.
async fn scoped<A: DatabaseAdapter, T>(adapter: &mut A, outcome: DbResult<T>) -> DbResult<T> {
    release(adapter).await;
    outcome
}

/// Entry point for the four browser operations.
#[derive(Debug, Clone)]
pub struct BrowserService<N = HttpAnnotator> {
    annotator: Option<N>,
    annotation_timeout: Duration,
    connect_timeout: Option<Duration>,
}

impl<N> Default for BrowserService<N> {
    fn default() -> Self {
        Self {
            annotator: None,
            annotation_timeout: Duration::from_secs(crate::config::DEFAULT_ANNOTATION_TIMEOUT_SECS),
            connect_timeout: None,
        }
    }
}

impl BrowserService<HttpAnnotator> {
    /// Build from the process configuration.
    pub fn from_config(config: &crate::Config) -> DbResult<Self> {
        Ok(Self {
            annotator: config.annotator()?,
            annotation_timeout: config.annotation_timeout_duration(),
            connect_timeout: config.connect_timeout_duration(),
        })
    }
}

impl<N: SchemaAnnotator> BrowserService<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_annotator(mut self, annotator: N, timeout: Duration) -> Self {
        self.annotator = Some(annotator);
        self.annotation_timeout = timeout;
        self
    }

    /// Applied to requests that do not set their own connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn adapter(&self, db_type: DatabaseType, mut config: DatabaseConfig) -> DbResult<AnyAdapter> {
        if config.options.connect_timeout_secs.is_none() {
            config.options.connect_timeout_secs = self.connect_timeout.map(|d| d.as_secs());
        }
        create_adapter(db_type, config)
    }

    // -------------------------------------------------------------------------
    // Connection check
    // -------------------------------------------------------------------------

    /// Connect and round-trip a trivial query.
    ///
    /// Connection failures are errors; `false` means the connection opened
    /// but the trivial query did not succeed.
    pub async fn check_connection(&self, request: ConnectRequest) -> DbResult<bool> {
        let mut adapter = self.adapter(request.db_type, request.config)?;
        check_connection_with(&mut adapter).await
    }

    // -------------------------------------------------------------------------
    // Table listing
    // -------------------------------------------------------------------------

    /// Schema names and column-less table summaries.
    pub async fn list_tables(&self, request: ConnectRequest) -> DbResult<TableListing> {
        info!(
            engine = %request.db_type,
            database = %request.config.database,
            "Fetching table list"
        );
        let mut adapter = self.adapter(request.db_type, request.config)?;
        list_tables_with(&mut adapter).await
    }

    // -------------------------------------------------------------------------
    // Schema extraction
    // -------------------------------------------------------------------------

    /// Selective schema analysis, then best-effort labeling.
    ///
    /// The connection is released before labeling starts. Labeling runs only
    /// when an annotator is configured and an API key is available from the
    /// request or the annotator itself.
    pub async fn extract_schema(&self, request: SchemaRequest) -> DbResult<SchemaExtraction> {
        info!(
            engine = %request.db_type,
            database = %request.config.database,
            selected_tables = ?request.selected_tables,
            selected_schemas = ?request.selected_schemas,
            "Schema extraction started"
        );

        let mut adapter = self.adapter(request.db_type, request.config)?;
        let metadata = analyze_with(
            &mut adapter,
            request.selected_tables.as_deref(),
            request.selected_schemas.as_deref(),
        )
        .await?;

        let ai_analysis = self
            .annotate(&metadata, request.api_key.as_deref())
            .await;

        Ok(SchemaExtraction {
            metadata,
            ai_analysis,
        })
    }

    async fn annotate(
        &self,
        metadata: &SchemaMetadata,
        api_key: Option<&str>,
    ) -> Option<SchemaAnnotations> {
        let annotator = self.annotator.as_ref()?;
        let api_key = api_key.filter(|k| !k.is_empty());
        if api_key.is_none() && !annotator.has_api_key() {
            info!("Skipping schema annotation, no API key provided");
            return None;
        }
        annotate_schema(annotator, metadata, api_key, self.annotation_timeout).await
    }

    // -------------------------------------------------------------------------
    // Table data
    // -------------------------------------------------------------------------

    /// Filtered, sorted, paginated rows of one table.
    pub async fn query_table(&self, request: QueryRequest) -> DbResult<QueryResult> {
        let options = request.options.unwrap_or_default();
        info!(
            engine = %request.db_type,
            table = %request.table,
            schema = ?request.schema,
            filters = options.filters.len(),
            sorts = options.sorts.len(),
            pagination = ?options.pagination,
            "Query request"
        );

        let mut adapter = self.adapter(request.db_type, request.config)?;
        let result =
            query_table_with(&mut adapter, &request.table, request.schema.as_deref(), &options)
                .await;

        if let Ok(r) = &result {
            info!(
                rows = r.rows.len(),
                total = r.row_count,
                columns = r.columns.len(),
                "Query result"
            );
        }
        result
    }
}

// -----------------------------------------------------------------------------
// Operations on a caller-supplied adapter
// -----------------------------------------------------------------------------

/// Connect and run a trivial query, then disconnect. See [`BrowserService::check_connection`].
pub async fn check_connection_with<A: DatabaseAdapter>(adapter: &mut A) -> DbResult<bool> {
    let outcome: DbResult<_> = async {
        adapter.connect().await?;
        Ok(adapter.test_connection().await)
    }
    .await;
    scoped(adapter, outcome).await
}

/// Schema names and table summaries, then disconnect.
pub async fn list_tables_with<A: DatabaseAdapter>(adapter: &mut A) -> DbResult<TableListing> {
    let outcome: DbResult<_> = async {
        adapter.connect().await?;
        let schemas = adapter.get_schemas().await?;
        let tables = adapter
            .get_tables(None)
            .await?
            .into_iter()
            .map(|t| TableSummary {
                name: t.name,
                schema: t.schema,
                row_count: t.row_count,
            })
            .collect();
        Ok(TableListing { schemas, tables })
    }
    .await;
    scoped(adapter, outcome).await
}

/// Selective analysis, then disconnect.
pub async fn analyze_with<A: DatabaseAdapter>(
    adapter: &mut A,
    selected_tables: Option<&[String]>,
    selected_schemas: Option<&[String]>,
) -> DbResult<SchemaMetadata> {
    let outcome: DbResult<_> = async {
        adapter.connect().await?;
        let mut analyzer = SchemaAnalyzer::new(&mut *adapter);

        let total = analyzer
            .table_count_for_selection(selected_tables, selected_schemas)
            .await?;
        info!(tables = total, "Will process tables");

        let start = Instant::now();
        let metadata = analyzer
            .analyze_for_selected_tables(selected_tables, selected_schemas)
            .await?;
        info!(
            schemas = metadata.schemas.len(),
            tables = metadata.tables.len(),
            relationships = metadata.relationships.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Schema extracted"
        );
        Ok(metadata)
    }
    .await;
    scoped(adapter, outcome).await
}

/// One page of table rows, then disconnect.
pub async fn query_table_with<A: DatabaseAdapter>(
    adapter: &mut A,
    table: &str,
    schema: Option<&str>,
    options: &QueryOptions,
) -> DbResult<QueryResult> {
    if table.trim().is_empty() {
        return Err(DbError::validation("Table name is required"));
    }
    let outcome: DbResult<_> = async {
        adapter.connect().await?;
        adapter.get_table_data(table, schema, options).await
    }
    .await;
    scoped(adapter, outcome).await
}
