use std::str::FromStr;

/// Initialize tracing for the binary and for tests.
///
/// Unknown level names fall back to `info`. Safe to call more than once.
pub fn init(level: &str) {
    let level = tracing::Level::from_str(level.trim()).unwrap_or(tracing::Level::INFO);

    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .try_init();
}
