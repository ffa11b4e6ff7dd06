//! Configuration resolution for EPGenius.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/epgenius/settings.json)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables (`EPGENIUS_*`)
//! 5. CLI arguments (highest priority, applied by the binary)
//!
//! Files may be partial: they are merged key by key over what came before.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::eligibility::EligibilityConfig;
use crate::error::{Error, Result};
use crate::resolver::DEFAULT_THRESHOLD;

/// Complete EPGenius configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub registry: RegistryConfig,
    pub enrichment: EnrichmentConfig,
    pub records: RecordsConfig,
    pub eligibility: EligibilityConfig,
    pub resolver: ResolverConfig,
    pub monitor: MonitorConfig,
    pub notifications: NotificationsConfig,
}

/// Registry endpoint and durable snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RegistryConfig {
    pub url: Option<String>,
    pub timeout_secs: u64,
    /// Durable snapshot file. Defaults to [`default_snapshot_path`].
    pub snapshot_path: Option<PathBuf>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 10,
            snapshot_path: None,
        }
    }
}

impl RegistryConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub ttl_secs: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

impl EnrichmentConfig {
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Per-user record endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RecordsConfig {
    pub url: Option<String>,
    /// Bearer token sent to the record endpoint.
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            timeout_secs: 10,
        }
    }
}

impl RecordsConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResolverConfig {
    pub threshold: u8,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub targets: Vec<MonitorTargetConfig>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            timeout_secs: 10,
            targets: Vec::new(),
        }
    }
}

impl MonitorConfig {
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// One monitored health-check URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitorTargetConfig {
    pub name: String,
    pub url: String,
    /// Overrides `notifications.webhook_url` for this target.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Overrides `notifications.mentions` when non-empty.
    #[serde(default)]
    pub mentions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationsConfig {
    pub webhook_url: Option<String>,
    pub mentions: Vec<String>,
}

impl Config {
    /// Reject values the services cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.monitor.interval_secs == 0 {
            return Err(Error::Config("monitor.interval_secs must be > 0".into()));
        }
        if self.resolver.threshold > 100 {
            return Err(Error::Config(format!(
                "resolver.threshold must be 0..=100, got {}",
                self.resolver.threshold
            )));
        }
        for target in &self.monitor.targets {
            if target.url.trim().is_empty() {
                return Err(Error::Config(format!(
                    "monitor target '{}' has an empty url",
                    target.name
                )));
            }
        }
        Ok(())
    }

    /// Snapshot path from config, or the platform default.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.registry
            .snapshot_path
            .clone()
            .or_else(default_snapshot_path)
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut merged = serde_json::to_value(Config::default())?;

    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            merge_values(&mut merged, load_config_file(&global_path)?);
        }
    }

    if let Some(path) = explicit {
        merge_values(&mut merged, load_config_file(path)?);
    }

    let mut config: Config = serde_json::from_value(merged)
        .map_err(|e| Error::Config(format!("Invalid configuration: {e}")))?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// `$XDG_CONFIG_HOME/epgenius` on Linux, the platform config dir elsewhere.
fn config_root() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("epgenius"))
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    config_root().map(|root| root.join("settings.json"))
}

/// Default location of the durable registry snapshot.
pub fn default_snapshot_path() -> Option<PathBuf> {
    config_root().map(|root| root.join("registry_snapshot.json"))
}

fn load_config_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {e}", path.display()))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {e}", path.display()))
    })
}

/// Recursively merge `overlay` into `base`. Objects merge per key; any
/// other value replaces.
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_values(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Apply `EPGENIUS_*` overrides read through `var`.
pub fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(val) = var("EPGENIUS_REGISTRY_URL") {
        config.registry.url = Some(val);
    }
    if let Some(val) = var("EPGENIUS_SNAPSHOT_PATH") {
        config.registry.snapshot_path = Some(PathBuf::from(val));
    }
    if let Some(val) = var("EPGENIUS_RECORDS_URL") {
        config.records.url = Some(val);
    }
    if let Some(val) = var("EPGENIUS_RECORDS_TOKEN") {
        config.records.token = Some(val);
    }
    if let Some(n) = var("EPGENIUS_ENRICHMENT_TTL_SECS").and_then(|v| v.parse().ok()) {
        config.enrichment.ttl_secs = n;
    }
    if let Some(n) = var("EPGENIUS_RESOLVER_THRESHOLD").and_then(|v| v.parse().ok()) {
        config.resolver.threshold = n;
    }
    if let Some(n) = var("EPGENIUS_MONITOR_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
        config.monitor.interval_secs = n;
    }
    if let Some(val) = var("EPGENIUS_WEBHOOK_URL") {
        config.notifications.webhook_url = Some(val);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    #[test]
    fn defaults_match_documented_windows() {
        let config = Config::default();
        assert_eq!(config.enrichment.ttl(), Duration::from_secs(300));
        assert_eq!(config.registry.timeout(), Duration::from_secs(10));
        assert_eq!(config.monitor.interval(), Duration::from_secs(60));
        assert_eq!(config.resolver.threshold, 80);
        assert_eq!(config.eligibility.grace_period_hours, 24);
        assert_eq!(config.eligibility.owner_sync_window_hours, 5);
        assert_eq!(config.eligibility.supporter_max_age_hours, 36);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_only_overrides_named_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            json!({
                "registry": {"url": "https://registry.example/playlists"},
                "eligibility": {"supporter_max_age_hours": 48},
                "monitor": {"targets": [{"name": "api", "url": "https://api.example/health"}]}
            })
            .to_string(),
        )
        .unwrap();

        let mut merged = serde_json::to_value(Config::default()).unwrap();
        merge_values(&mut merged, load_config_file(&path).unwrap());
        let config: Config = serde_json::from_value(merged).unwrap();

        assert_eq!(
            config.registry.url.as_deref(),
            Some("https://registry.example/playlists")
        );
        assert_eq!(config.registry.timeout_secs, 10);
        assert_eq!(config.eligibility.supporter_max_age_hours, 48);
        assert_eq!(config.eligibility.grace_period_hours, 24);
        assert_eq!(config.monitor.targets.len(), 1);
        assert!(config.monitor.targets[0].mentions.is_empty());
    }

    #[test]
    fn unreadable_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ nope").unwrap();

        assert!(matches!(load_config_file(&path), Err(Error::Config(_))));
        assert!(matches!(
            load_config_file(&dir.path().join("missing.json")),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn env_overrides_apply_and_ignore_garbage() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("EPGENIUS_RECORDS_TOKEN", "secret"),
            ("EPGENIUS_ENRICHMENT_TTL_SECS", "60"),
            ("EPGENIUS_RESOLVER_THRESHOLD", "not-a-number"),
        ]);
        let mut config = Config::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(ToString::to_string));

        assert_eq!(config.records.token.as_deref(), Some("secret"));
        assert_eq!(config.enrichment.ttl_secs, 60);
        assert_eq!(config.resolver.threshold, 80);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = Config::default();
        config.monitor.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.resolver.threshold = 101;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.monitor.targets.push(MonitorTargetConfig {
            name: "blank".into(),
            url: " ".into(),
            webhook_url: None,
            mentions: Vec::new(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn explicit_snapshot_path_wins() {
        let mut config = Config::default();
        config.registry.snapshot_path = Some(PathBuf::from("/tmp/snap.json"));
        assert_eq!(config.snapshot_path(), Some(PathBuf::from("/tmp/snap.json")));
    }
}
