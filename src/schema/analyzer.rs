//! Full and selective schema analysis on top of a [`DatabaseAdapter`].
//!
//! Selective analysis lists table names first and only pays for column
//! introspection on the tables that survive the selection.

use crate::db::DatabaseAdapter;
use crate::error::{DbError, DbResult};
use crate::models::{Relationship, SchemaMetadata, Table};
use crate::schema::relations::retain_within;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Builds [`SchemaMetadata`] through a borrowed, connected adapter.
pub struct SchemaAnalyzer<'a, A> {
    adapter: &'a mut A,
}

impl<'a, A: DatabaseAdapter> SchemaAnalyzer<'a, A> {
    pub fn new(adapter: &'a mut A) -> Self {
        Self { adapter }
    }

    /// Introspect every schema, table, column and relationship.
    pub async fn analyze(&mut self) -> DbResult<SchemaMetadata> {
        self.adapter.get_schema_metadata().await
    }

    /// Introspect only the selected schemas and tables.
    ///
    /// `selected_tables` holds `schema.table` (or bare `table`) keys matched
    /// exactly; an empty list counts as no selection. Relationships are kept
    /// only when both endpoints are among the returned tables. A table whose
    /// columns cannot be read is returned with no columns.
    pub async fn analyze_for_selected_tables(
        &mut self,
        selected_tables: Option<&[String]>,
        selected_schemas: Option<&[String]>,
    ) -> DbResult<SchemaMetadata> {
        let (schemas, tables) = self.select(selected_tables, selected_schemas).await?;

        let total = tables.len();
        info!(tables = total, "Processing selected tables");

        let mut with_columns = Vec::with_capacity(total);
        for (i, mut table) in tables.into_iter().enumerate() {
            let key = table.key();
            debug!(table = %key, "[{}/{}] Fetching columns", i + 1, total);
            match self
                .adapter
                .get_columns(&table.name, table.schema.as_deref())
                .await
            {
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
            with_columns.push(table);
        }
        info!(tables = with_columns.len(), "Completed processing tables");

        let keys: HashSet<String> = with_columns.iter().map(Table::key).collect();
        let all = self.adapter.get_relationships().await?;
        let fetched = all.len();
        let relationships = retain_within(all, |k| keys.contains(k));
        debug!(
            fetched,
            kept = relationships.len(),
            "Pruned relationships to selection"
        );

        Ok(SchemaMetadata {
            schemas,
            tables: with_columns,
            relationships,
        })
    }

    /// Number of tables a selective analysis with the same arguments would
    /// fetch columns for.
    pub async fn table_count_for_selection(
        &mut self,
        selected_tables: Option<&[String]>,
        selected_schemas: Option<&[String]>,
    ) -> DbResult<usize> {
        let (_, tables) = self.select(selected_tables, selected_schemas).await?;
        Ok(tables.len())
    }

    /// Tables of one schema with their columns. Failures propagate.
    pub async fn tables_for_schema(&mut self, schema: Option<&str>) -> DbResult<Vec<Table>> {
        let tables = self.adapter.get_tables(schema).await?;
        let mut with_columns = Vec::with_capacity(tables.len());
        for mut table in tables {
            table.columns = self
                .adapter
                .get_columns(&table.name, table.schema.as_deref())
                .await?;
            with_columns.push(table);
        }
        Ok(with_columns)
    }

    /// Relationships in which the table is either side.
    pub async fn relationships_for_table(
        &mut self,
        table: &str,
        schema: Option<&str>,
    ) -> DbResult<Vec<Relationship>> {
        let all = self.adapter.get_relationships().await?;
        Ok(all
            .into_iter()
            .filter(|r| r.touches(table, schema))
            .collect())
    }

    /// Filtered schema names and the column-less tables surviving selection.
    async fn select(
        &mut self,
        selected_tables: Option<&[String]>,
        selected_schemas: Option<&[String]>,
    ) -> DbResult<(Vec<String>, Vec<Table>)> {
        let schemas: Vec<String> = self
            .adapter
            .get_schemas()
            .await?
            .into_iter()
            .filter(|s| selected_schemas.is_none_or(|sel| sel.contains(s)))
            .collect();

        let mut tables = Vec::new();
        for schema in &schemas {
            tables.extend(self.adapter.get_tables(Some(schema)).await?);
        }

        if let Some(selected) = selected_tables.filter(|s| !s.is_empty()) {
            let wanted: HashSet<&str> = selected.iter().map(String::as_str).collect();
            tables.retain(|t| wanted.contains(t.key().as_str()));
        }

        Ok((schemas, tables))
    }
}
