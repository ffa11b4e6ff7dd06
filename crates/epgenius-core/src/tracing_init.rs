//! Tracing/logging initialization shared by the EPGenius binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Crates whose events are shown at the requested level by default.
const OWN_CRATES: &[&str] = &["epgenius_core", "epgenius_daemon", "epgenius"];

/// Filter directive enabling `level` for our crates and `warn` elsewhere.
pub fn default_filter(level: &str) -> String {
    let mut directives = vec!["warn".to_string()];
    directives.extend(OWN_CRATES.iter().map(|krate| format!("{krate}={level}")));
    directives.join(",")
}

/// Initialise the global tracing subscriber.
///
/// * `default_filter` -- used when `RUST_LOG` is not set.
/// * `log_json` -- emit one JSON object per event instead of text.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(default_filter: &str, log_json: bool) -> bool {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
    );
    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_scopes_level_to_own_crates() {
        assert_eq!(
            default_filter("debug"),
            "warn,epgenius_core=debug,epgenius_daemon=debug,epgenius=debug"
        );
    }

    #[test]
    fn second_init_is_reported_not_fatal() {
        init_tracing("warn", false);
        assert!(!init_tracing("warn", true));
    }
}
