//! Tracing setup for the `autumndb` binary.
//!
//! Mirrors the driver crate's logging module: a single `EnvFilter` scoped to
//! this crate, human-readable by default with an optional JSON layer, no
//! metrics/exporter pipeline attached.

use tracing_subscriber::{fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

/// Initializes the global tracing subscriber.
///
/// `verbose` maps `0` to `info`, `1` to `debug`, and anything higher to
/// `trace`, scoped to the `autumndb` crate. `json` selects structured JSON
/// output over the human-readable default.
pub fn init_tracing(json: bool, verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::new(format!("autumndb={level}"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json().flatten_event(true)).init();
    }
    else {
        registry.with(fmt::layer()).init();
    }
}
