//! Transport layer for the browser API.
//!
//! - HTTP: JSON endpoints served with axum

pub mod http;

pub use http::{HttpTransport, router};

use crate::error::DbResult;
use std::future::Future;

/// Trait for transport implementations.
pub trait Transport: Send + Sync {
    /// Start the transport and begin handling requests.
    ///
    /// This method should block until the transport is shut down.
    fn run(&self) -> impl Future<Output = DbResult<()>> + Send;

    /// Get the name of this transport for logging.
    fn name(&self) -> &'static str;
}
