use tracing_subscriber::{fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

/// Initializes tracing for the driver binary, scoped to its own crate name.
///
/// `verbose` maps `0` to `info`, `1` to `debug`, and anything higher to
/// `trace`. `json` selects structured JSON output over the human-readable
/// default.
pub fn init_tracing(json: bool, verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::new(format!("autumndb_cli={level}"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json().flatten_event(true)).init();
    }
    else {
        registry.with(fmt::layer()).init();
    }
}
