//! Tracing subscriber setup for hosts that do not install their own.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "psyframe=info";

/// Install a global `fmt` subscriber filtered by `RUST_LOG`.
///
/// Returns `false` if a global subscriber was already set, which is the
/// normal case when the host application configures tracing itself.
pub fn init_tracing(json: bool) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init()
    };
    installed.is_ok()
}
