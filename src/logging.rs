use tracing_subscriber::EnvFilter;

/// Initializes the structured JSON logger. Must run before any other component per the
/// initialization order in the design notes, so that startup itself is logged.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(false)
        .with_span_list(false)
        .init();
}
