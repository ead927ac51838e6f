//! Logging configuration using tracing
//!
//! Structured logging to stderr with support for the RUST_LOG environment variable.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when RUST_LOG is unset
fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "deskbridge=debug,zendesk=debug"
    } else {
        "deskbridge=info,zendesk=info"
    }
}

/// Initialize the tracing subscriber
///
/// `RUST_LOG` takes precedence; otherwise Deskbridge logs at `info`, or at
/// `debug` when `verbose` is set.
///
/// # Example RUST_LOG values
/// - `RUST_LOG=debug` - Everything at debug and above
/// - `RUST_LOG=deskbridge::bridge=trace` - Trace the reconciliation engine only
///
/// # Errors
/// Returns an error if the subscriber has already been initialized
pub fn init(verbose: bool) -> crate::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| crate::BridgeError::Other(format!("Failed to initialize tracing: {}", e)))?;

    Ok(())
}

/// Initialize logging for tests (no-op if already initialized)
pub fn init_test() {
    let _ = init(true);
}
