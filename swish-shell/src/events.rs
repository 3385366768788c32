//! Tracing setup for the shell binary.

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber. The filter comes from the
/// command line when given, else the `SWISH_LOG` environment variable, else
/// warnings only. Diagnostics go to standard error so they never mix with
/// command output.
pub(crate) fn init_tracing(filter: Option<String>) {
    let filter = filter
        .or_else(|| std::env::var("SWISH_LOG").ok())
        .unwrap_or_else(|| "warn".to_owned());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}
