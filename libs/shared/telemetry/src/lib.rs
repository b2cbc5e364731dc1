//! One entry point for wiring up `tracing` the same way across every binary
//! and integration test in the workspace, so output format is never a
//! per-crate decision.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global tracing subscriber. Debug builds get a compact,
/// human-readable layer (good for interactive use against a real or
/// simulated fleet); release builds get line-delimited JSON, suited to
/// unattended collection. Either way `RUST_LOG` overrides the default
/// filter, which otherwise only surfaces `info` and above.
///
/// Safe to call more than once: subsequent calls are no-ops rather than
/// panicking, since test binaries in this workspace each call it from
/// their own setup.
pub fn init_tracing() {
    let result = if cfg!(debug_assertions) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt().with_env_filter(filter).with_target(true).compact().try_init()
    } else {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(true)
            .try_init()
    };

    if let Err(error) = result {
        tracing::trace!(%error, "tracing subscriber already installed");
    }
}
