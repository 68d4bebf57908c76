use moeconfig::Config;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Installe le subscriber global
///
/// `RUST_LOG` prime sur `host.logger.min_level`.
pub fn init_logging(config: &Config) {
    let min_level = config
        .get_log_min_level()
        .unwrap_or_else(|_| "INFO".to_string())
        .to_lowercase();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(min_level));
    let ansi = config.get_log_ansi().unwrap_or(true);

    Registry::default()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(ansi),
        )
        .init();
}
