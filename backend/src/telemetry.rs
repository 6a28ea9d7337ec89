//! Tracing subscriber setup

use crate::config::{AppConfig, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
///
/// `RUST_LOG` takes precedence over the configured filter. JSON output is
/// used in production or when `logging.json` is set.
pub fn init_tracing(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    // try_init: a host application may already own the global subscriber
    if logging.json || AppConfig::is_production() {
        let _ = subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .try_init();
    } else {
        let _ = subscriber
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        let logging = LoggingConfig::default();
        init_tracing(&logging);
        init_tracing(&logging);
        tracing::info!("tracing initialised");
    }
}
