//! Tracing setup for the binary.
//!
//! The filter comes from `RUST_LOG` when it is set and parses, otherwise from
//! `[logging]` in the configuration: `level` for every target plus the extra
//! directives in `filter`.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

/// Installs the global fmt subscriber. Later calls are no-ops, so tests and
/// the CLI can both call it.
pub fn init(settings: &LoggingSettings) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(settings))
        .with_target(false)
        .try_init();
}

pub fn build_filter(settings: &LoggingSettings) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let directive = directive(settings);
    EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        // No subscriber is installed yet, so this cannot go through tracing.
        eprintln!("Invalid log filter '{directive}': {e}; falling back to 'info'");
        EnvFilter::new("info")
    })
}

fn directive(settings: &LoggingSettings) -> String {
    let level = normalize_level(&settings.level);
    match settings.filter.as_deref().map(str::trim) {
        Some(extra) if !extra.is_empty() => format!("{level},{extra}"),
        _ => level.to_string(),
    }
}

fn normalize_level(level: &str) -> &'static str {
    match level.to_lowercase().as_str() {
        "error" => "error",
        "warn" | "warning" => "warn",
        "debug" => "debug",
        "trace" => "trace",
        "off" => "off",
        _ => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tracing_subscriber::filter::LevelFilter;

    fn settings(level: &str, filter: Option<&str>) -> LoggingSettings {
        LoggingSettings {
            level: level.to_string(),
            filter: filter.map(str::to_string),
        }
    }

    #[test]
    fn unknown_levels_fall_back_to_info() {
        assert_eq!(normalize_level("verbose"), "info");
        assert_eq!(normalize_level("WARNING"), "warn");
        assert_eq!(normalize_level("Trace"), "trace");
    }

    #[test]
    fn extra_directives_follow_the_level() {
        assert_eq!(directive(&settings("debug", None)), "debug");
        assert_eq!(directive(&settings("info", Some("  "))), "info");
        assert_eq!(
            directive(&settings("Warning", Some("poprelay=trace"))),
            "warn,poprelay=trace"
        );
    }

    #[test]
    #[serial]
    fn config_filter_applies_without_rust_log() {
        let filter = temp_env::with_var_unset("RUST_LOG", || {
            build_filter(&settings("warn", Some("poprelay=trace")))
        });
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    #[serial]
    fn invalid_config_filter_falls_back_to_info() {
        let filter = temp_env::with_var_unset("RUST_LOG", || {
            build_filter(&settings("error", Some("tungstenite=loud")))
        });
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    #[serial]
    fn rust_log_overrides_config() {
        let filter = temp_env::with_var("RUST_LOG", Some("error"), || {
            build_filter(&settings("trace", None))
        });
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::ERROR));
    }
}
