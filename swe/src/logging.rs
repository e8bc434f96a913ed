//! Diagnostic tracing for the `swe` CLI.
//!
//! User-facing results go to stdout via `println!`. Tracing is diagnostics
//! only and always writes to stderr.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the level is `warn`, or `info` when
/// `verbose` is set so per-file context reads become visible.
///
/// # Example
/// ```bash
/// RUST_LOG=swe=debug swe implement "add a --json flag"
/// ```
pub fn init(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .without_time()
                .with_target(false)
                .compact(),
        )
        .init();
}
