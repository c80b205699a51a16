//! Logging setup.
//!
//! `wb` is a short-lived command, so observability is a single stderr fmt layer
//! filtered by `RUST_LOG`. Operator-facing output goes to stdout from the CLI;
//! tracing events carry the structured detail behind it.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "warn";

/// Install the global subscriber.
///
/// Call once at startup. `verbose` raises the default filter to `debug` for wb's
/// own crates; an explicit `RUST_LOG` always wins.
pub fn init(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let default = if verbose { "warn,wb_core=debug,wb=debug" } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_target(verbose)
                .with_writer(std::io::stderr),
        )
        .try_init()?;

    tracing::debug!("Logging initialized");
    Ok(())
}
