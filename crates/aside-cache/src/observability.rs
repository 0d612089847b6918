//! Tracing subscriber setup for binaries and tests embedding the cache.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

use crate::config::LogSettings;

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

/// Install a global subscriber at `info`, unless `RUST_LOG` says otherwise.
pub fn init_tracing() {
    init_tracing_with(&LogSettings::default());
}

/// Install a global subscriber from settings. `RUST_LOG` wins over
/// `settings.level`. A second call is a no-op.
pub fn init_tracing_with(settings: &LogSettings) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(&settings.level));

    let (filter_layer, handle) = reload::Layer::new(filter);
    if LOG_RELOAD_HANDLE.set(handle).is_err() {
        return;
    }

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_ansi(settings.ansi).with_target(settings.with_target))
        .try_init();
}

/// Swap the active filter. Returns `false` if tracing was not set up here.
pub fn apply_logging_level(level: &str) -> bool {
    LOG_RELOAD_HANDLE
        .get()
        .is_some_and(|handle| handle.modify(|f| *f = EnvFilter::new(level)).is_ok())
}
