//! Logging utilities built on the `log` facade with an `env_logger` backend

pub use log::{debug, info, warn, error, trace, LevelFilter};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize logging before the configured level is known
///
/// Records pass at `Info` until [`apply_configured_level`] narrows or widens
/// the filter. `RUST_LOG` overrides both when it is set. Calling this more
/// than once is harmless; later calls are ignored.
pub fn init_early() {
    let rust_log = std::env::var("RUST_LOG").ok();
    let env = env_logger::Env::default().default_filter_or("trace");
    let installed = env_logger::Builder::from_env(env).try_init().is_ok();

    if installed && configured_max_level(rust_log.as_deref(), "info").is_some() {
        log::set_max_level(LevelFilter::Info);
    }
}

/// Switch the early logger to the level named in the configuration
pub fn apply_configured_level(level: &str) {
    let rust_log = std::env::var("RUST_LOG").ok();
    if let Some(max) = configured_max_level(rust_log.as_deref(), level) {
        log::set_max_level(max);
    }
}

/// Level to install, or `None` when `RUST_LOG` already decided
fn configured_max_level(rust_log: Option<&str>, level: &str) -> Option<LevelFilter> {
    match rust_log {
        Some(filter) if !filter.trim().is_empty() => None,
        _ => Some(parse_level(level)),
    }
}

/// Parse a configured level name, falling back to `Info`
pub fn parse_level(level: &str) -> LevelFilter {
    level.parse().unwrap_or(LevelFilter::Info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level("WARN"), LevelFilter::Warn);
        assert_eq!(parse_level("not-a-level"), LevelFilter::Info);
    }

    #[test]
    fn test_rust_log_wins_over_configured_level() {
        assert_eq!(configured_max_level(None, "debug"), Some(LevelFilter::Debug));
        assert_eq!(configured_max_level(Some(""), "warn"), Some(LevelFilter::Warn));
        assert_eq!(configured_max_level(Some("splat_engine=trace"), "warn"), None);
    }
}
