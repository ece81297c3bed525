use std::time::Duration;

/// Long enough for a healthy dispatch loop, short enough to keep hazard tests fast.
pub const TIMEOUT: Duration = Duration::from_secs(5);

pub const HAZARD_TIMEOUT: Duration = Duration::from_millis(100);

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub fn init_logger() {
    use tracing_subscriber::layer::SubscriberExt;
    let subscriber = tracing_subscriber::Registry::default()
        .with(tracing_subscriber::fmt::layer().with_test_writer());
    // Every test calls this, only the first one installs the subscriber.
    let _ = tracing::subscriber::set_global_default(subscriber);
}
