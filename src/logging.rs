use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// Diagnostics go to stderr so stdout stays clean for command output.
/// `RUST_LOG` controls the level and defaults to `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Fails only if a subscriber is already installed; the first one stays.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
