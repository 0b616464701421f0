use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "archivist=info";

/// Initialize the stderr tracing subscriber. `ARCHIVIST_LOG` wins over
/// `RUST_LOG`; both fall back to info-level output for this crate only.
pub fn init() {
    let filter = EnvFilter::try_from_env("ARCHIVIST_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
