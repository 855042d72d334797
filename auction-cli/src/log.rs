use tracing_subscriber::{fmt, EnvFilter};

/// Sends logs to stderr; stdout carries usage text and transaction results.
pub fn init() {
    let subscriber = fmt::Subscriber::builder()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install the log subscriber: {e}");
        return;
    }
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to forward `log` records: {e}");
    }
}
