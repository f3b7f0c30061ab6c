//! Logging initialization

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` controls the filter; defaults to `info` for the engine and
/// `warn` for dependencies. `LOG_FORMAT=json` switches to line-delimited
/// JSON for log shippers. Safe to call once per process.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,dispatch_server=info,shared=info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if std::env::var("LOG_FORMAT").is_ok_and(|v| json_format(&v)) {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn json_format(value: &str) -> bool {
    value.eq_ignore_ascii_case("json")
}
