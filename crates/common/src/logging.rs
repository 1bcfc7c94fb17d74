//! Logging bootstrap for hosts embedding the governance engine

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{Error, Result};

/// Install a console `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `log_level` when set. Fails if a global
/// subscriber is already installed.
pub fn init_logging(log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| Error::Logging(format!("Invalid log level {}: {}", log_level, e)))?;

    let console_layer = fmt::layer().with_target(true).with_thread_ids(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()
        .map_err(|e| Error::Logging(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_reported() {
        // Whichever call wins the race installs the subscriber; a second
        // install in the same process must surface as an error.
        let _ = init_logging("debug");
        let err = init_logging("debug").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Logging);
    }
}
