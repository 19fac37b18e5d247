//! Data models for the database browser.
//!
//! This module re-exports all model types used throughout the application.

pub mod annotation;
pub mod connection;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use annotation::{
    AggregateKind, ColumnConfig, DisplayFormat, ProfileCard, ProfileLayout, SchemaAnnotations,
    SchemaDigest,
};
pub use connection::{ConnectionOptions, DEFAULT_SQLSERVER_PORT, DatabaseConfig, DatabaseType};
pub use query::{
    Filter, FilterOperator, NamedParam, Pagination, QueryOptions, QueryParam, QueryResult, Row,
    RowValue, Sort, SortDirection,
};
pub use schema::{
    Column, ForeignKey, Relationship, RelationshipType, SchemaMetadata, Table, table_key,
};
