//! # Observability
//!
//! Structured logging to stderr and request tracing for the export server.

pub mod http_tracing;
pub mod logging;

pub use http_tracing::trace_http_requests;
pub use logging::init_logging;
