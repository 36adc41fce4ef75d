//! Process-wide `tracing` subscriber setup.
//!
//! Library code only emits events; binaries and tests call [`init_logging`]
//! to see them. `RUST_LOG` takes precedence over the supplied default filter.

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install a fmt subscriber once per process.
///
/// Safe to call repeatedly and from several threads. If another subscriber
/// is already installed (for example by a host application) it is kept.
pub fn init_logging(default_filter: &str) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));

        if tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_names(true)
            .try_init()
            .is_err()
        {
            tracing::debug!("global tracing subscriber already installed, keeping it");
        }
    });
}
