//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - The engine-agnostic adapter contract and its dispatch enum
//! - The SQL Server adapter
//! - Query translation from browse options to parameterized T-SQL
//! - Named parameter binding
//! - Read-only statement validation
//! - Type mappings

pub mod adapter;
#[macro_use]
pub mod macros;
pub mod params;
pub mod query_builder;
pub mod sql_validator;
pub mod sqlserver;
pub mod types;

pub use adapter::{AnyAdapter, DatabaseAdapter, create_adapter};
pub use query_builder::{TableQuery, build_table_query};
pub use sqlserver::SqlServerAdapter;
