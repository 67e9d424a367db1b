// 📝 Logging - tracing subscriber setup for the binary and for tests

use tracing_subscriber::EnvFilter;

/// Env var holding an `EnvFilter` directive, e.g. `micro_measure=debug`
pub const LOG_ENV_VAR: &str = "MICRO_MEASURE_LOG";

/// Levels accepted in configuration
pub const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

pub fn is_known_level(level: &str) -> bool {
    LOG_LEVELS.iter().any(|known| known.eq_ignore_ascii_case(level.trim()))
}

/// Install the global fmt subscriber. `MICRO_MEASURE_LOG` wins over `level`.
///
/// Only the first call installs anything; later calls return an error that
/// callers may ignore.
pub fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(level.trim().to_ascii_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_levels() {
        assert!(is_known_level("info"));
        assert!(is_known_level(" DEBUG "));
        assert!(!is_known_level("verbose"));
    }

    #[test]
    fn test_second_init_is_an_error_not_a_panic() {
        // Whichever call wins the race, at most one can succeed
        let first = init_logging("warn");
        let second = init_logging("debug");
        assert!(second.is_err() || first.is_err());
    }
}
