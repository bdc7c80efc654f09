// common/src/utils.rs
use std::env;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Setup tracing for consistent logging across services
///
/// The max level comes from `LOG_LEVEL` (trace, debug, info, warn, error).
pub fn setup_tracing() {
    let level = env::var("LOG_LEVEL")
        .ok()
        .and_then(|v| Level::from_str(&v).ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}
