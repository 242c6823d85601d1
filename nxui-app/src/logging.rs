use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Logs go to stderr so console output on
/// stdout stays machine-readable.
///
/// Returns false if a subscriber was already installed.
pub fn init(filter: &str) -> bool {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|e| {
        eprintln!("Invalid log filter \"{filter}\" ({e}); falling back to info");
        EnvFilter::new("info")
    });

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true),
    );
    if subscriber.try_init().is_err() {
        return false;
    }

    tracing::debug!(filter, "tracing initialized");
    true
}
