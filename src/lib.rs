//! Database browser library.
//!
//! Schema introspection, relationship resolution and filtered row reads for
//! relational databases, served over a small JSON API. SQL Server is the one
//! engine with an adapter.

pub mod annotate;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod schema;
pub mod service;
pub mod transport;

pub use config::Config;
pub use error::DbError;
pub use service::BrowserService;
