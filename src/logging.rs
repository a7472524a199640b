use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Logs go to stderr so they never mix with streamed replies.
///
/// `RUST_LOG` wins when set; otherwise `verbosity` picks warn, info or debug.
pub fn init(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tutorchat={default_level},warn")));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
