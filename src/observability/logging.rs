//! # Structured Logging
//!
//! Span macros and subscriber setup. Diagnostics always go to stderr so
//! rendered output on stdout stays machine readable.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Create a tracing span for one call against the store.
///
/// ```rust,ignore
/// let span = store_span!("read", "team-a", "kv/app/db");
/// ```
#[macro_export]
macro_rules! store_span {
    ($operation:expr, $namespace:expr, $path:expr) => {
        tracing::debug_span!(
            "store_operation",
            operation = %$operation,
            namespace = %$namespace,
            path = %$path
        )
    };
    ($operation:expr, $namespace:expr, $path:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "store_operation",
            operation = %$operation,
            namespace = %$namespace,
            path = %$path,
            $($field)*
        )
    };
}

/// Create a tracing span for a served HTTP request.
#[macro_export]
macro_rules! request_span {
    ($method:expr, $path:expr) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            status_code = tracing::field::Empty
        )
    };
}

/// Create a tracing span for a whole command run.
#[macro_export]
macro_rules! command_span {
    ($command:expr) => {
        tracing::info_span!("command", command = %$command)
    };
    ($command:expr, $($field:tt)*) => {
        tracing::info_span!("command", command = %$command, $($field)*)
    };
}

/// Install the global stderr subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level is `warn`, or `debug` with
/// `verbose`. Installing twice is a no-op.
pub fn init_logging(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose);

    let result = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Logging already initialised");
    }
}
