use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Logs go to stderr; stdout carries service replies.
///
/// `RUST_LOG` wins when set. Otherwise only warnings are shown, or
/// informational messages too when `DEBUG` is set.
pub fn init() {
    let fallback = if std::env::var_os("DEBUG").is_some_and(|value| !value.is_empty()) {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
