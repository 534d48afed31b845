//! Logging setup utilities for the Yapper packages.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Crates whose logs are enabled by the default filter.
const WORKSPACE_CRATES: [&str; 2] = ["yapper_client", "yapper_shared"];

/// Build the default filter directive, e.g. `yapper_client=info,yapper_shared=info,client=info`.
fn default_directive(binary_name: &str, default_log_level: &str) -> String {
    WORKSPACE_CRATES
        .iter()
        .copied()
        .chain(std::iter::once(binary_name))
        .map(|target| format!("{}={}", target.replace('-', "_"), default_log_level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize the tracing subscriber with the specified default log level.
///
/// The log level can be overridden using the `RUST_LOG` environment variable.
/// Logs are written to stderr so they do not interleave with the interactive
/// prompt on stdout.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "yapper-client")
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use yapper_shared::logger::setup_logger;
///
/// setup_logger("yapper-client", "info");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive(binary_name, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
