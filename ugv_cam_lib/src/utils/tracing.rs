//! Tracing initialization shared by the agent binary and demos.

use eyre::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize tracing with the `info` default level.
///
/// `RUST_LOG` overrides the level. The subscriber is process-wide so
/// background workers log too. Fails if a global subscriber is already set.
///
/// # Example
/// ```no_run
/// use ugv_cam_lib::init_tracing;
///
/// fn main() -> eyre::Result<()> {
///     init_tracing()?;
///     // Drive the vehicle here
///     Ok(())
/// }
/// ```
pub fn init_tracing() -> Result<()> {
    init_tracing_with_default("info")
}

/// Same as [`init_tracing`] with a caller-chosen default directive,
/// e.g. `"ugv_agent=debug,info"`.
pub fn init_tracing_with_default(default_directive: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_thread_names(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to install tracing subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_subscriber_reaches_spawned_threads() {
        init_tracing_with_default("info").unwrap();

        assert!(tracing::enabled!(Level::WARN));
        let worker_enabled = std::thread::spawn(|| tracing::enabled!(Level::WARN))
            .join()
            .unwrap();
        assert!(worker_enabled);

        // A second global subscriber is refused
        assert!(init_tracing().is_err());
    }
}
