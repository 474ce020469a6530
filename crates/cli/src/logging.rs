use tracing_subscriber::EnvFilter;

/// Install the process-wide `tracing` subscriber. `RUST_LOG` follows the
/// usual `tracing_subscriber::EnvFilter` syntax; defaults to `info` so a
/// verb run with no configuration still logs something useful.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
