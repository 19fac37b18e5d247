//! HTTP transport for the browser API.
//!
//! Four JSON endpoints, one per browser operation:
//!
//! | Route | Operation |
//! |---|---|
//! | `POST /api/connect` | connection check |
//! | `POST /api/schema/tables` | schema and table listing |
//! | `POST /api/schema` | schema extraction with optional labeling |
//! | `POST /api/query` | filtered table rows |
//!
//! Failures answer `{ "error": message, "details": { "code": kind } }`.

use crate::annotate::HttpAnnotator;
use crate::error::{DbError, DbResult};
use crate::service::{BrowserService, ConnectRequest, QueryRequest, SchemaRequest};
use crate::transport::Transport;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

type SharedService = Arc<BrowserService<HttpAnnotator>>;

/// Error response wrapper.
#[derive(Debug)]
pub struct ApiError(DbError);

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(DbError::validation(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
            error!(error = %err, kind = err.kind(), "Request failed");
        } else {
            warn!(error = %err, kind = err.kind(), "Request rejected");
        }

        let mut details = json!({ "code": err.kind() });
        if let Some(number) = err.code() {
            details["number"] = json!(number);
        }
        if let Some(suggestion) = err.suggestion().filter(|s| !s.is_empty()) {
            details["suggestion"] = json!(suggestion);
        }
        (status, Json(json!({ "error": err.to_string(), "details": details }))).into_response()
    }
}

async fn connect(
    State(service): State<SharedService>,
    body: Result<Json<ConnectRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body?;
    if service.check_connection(request).await? {
        Ok(Json(json!({ "success": true })).into_response())
    } else {
        Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Failed to connect to database",
                "details": { "code": "connection" },
            })),
        )
            .into_response())
    }
}

async fn list_tables(
    State(service): State<SharedService>,
    body: Result<Json<ConnectRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body?;
    Ok(Json(service.list_tables(request).await?).into_response())
}

async fn extract_schema(
    State(service): State<SharedService>,
    body: Result<Json<SchemaRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body?;
    Ok(Json(service.extract_schema(request).await?).into_response())
}

async fn query_table(
    State(service): State<SharedService>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body?;
    Ok(Json(service.query_table(request).await?).into_response())
}

/// Build the API router.
pub fn router(service: SharedService) -> Router {
    Router::new()
        .route("/api/connect", post(connect))
        .route("/api/schema/tables", post(list_tables))
        .route("/api/schema", post(extract_schema))
        .route("/api/query", post(query_table))
        .with_state(service)
}

/// HTTP transport implementation.
pub struct HttpTransport {
    service: SharedService,
    /// Host to bind to
    host: String,
    /// Port to bind to
    port: u16,
}

impl HttpTransport {
    /// Create a new HTTP transport.
    pub fn new(service: SharedService, host: impl Into<String>, port: u16) -> Self {
        Self {
            service,
            host: host.into(),
            port,
        }
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Transport for HttpTransport {
    async fn run(&self) -> DbResult<()> {
        let bind_addr = self.bind_addr();
        info!("Starting database browser API on {}", bind_addr);

        let app = router(self.service.clone());

        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            DbError::internal(format!(
                "Failed to bind to {}: {}. Check that the port is available",
                bind_addr, e
            ))
        })?;

        // Schema extraction can run for minutes, so in-flight requests get a
        // bounded grace period after the first signal.
        const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let shutdown_notify_clone = shutdown_notify.clone();

        let shutdown_signal = async move {
            wait_for_signal().await;
            shutdown_notify_clone.notify_one();
        };

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => info!("HTTP server stopped"),
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        return Err(DbError::internal(format!("HTTP server error: {}", e)));
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Waiting for in-flight requests (send signal again to force exit)..."
                );

                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => {}
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
