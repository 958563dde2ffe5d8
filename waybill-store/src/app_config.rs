use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub worker: WorkerConfig,
    pub catalog: CatalogConfig,
    pub routing: RoutingConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Buffer of the status notification broadcast channel
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoutingConfig {
    pub cost_weight: f64,
    pub time_weight: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrackingConfig {
    #[serde(default = "default_allow_skips")]
    pub allow_skipped_statuses: bool,
    #[serde(default = "default_max_rejections")]
    pub max_recorded_rejections: usize,
    /// Idle shipments kept cached by the pipeline
    #[serde(default = "default_max_cached_shipments")]
    pub max_cached_shipments: usize,
}

fn default_notification_capacity() -> usize { 256 }
fn default_allow_skips() -> bool { true }
fn default_max_rejections() -> usize { 64 }
fn default_max_cached_shipments() -> usize { 1024 }

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            notification_capacity: default_notification_capacity(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            allow_skipped_statuses: default_allow_skips(),
            max_recorded_rejections: default_max_rejections(),
            max_cached_shipments: default_max_cached_shipments(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Developer overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `WAYBILL__ROUTING__COST_WEIGHT=0.7`
            .add_source(config::Environment::with_prefix("WAYBILL").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Parse a single TOML document, no layering
    pub fn from_toml(toml: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipped_defaults_parse() {
        let config = Config::from_toml(include_str!("../../config/default.toml")).unwrap();

        assert_eq!(config.catalog.path, "config/carriers.json");
        assert_eq!(config.routing.cost_weight, 0.5);
        assert_eq!(config.routing.time_weight, 0.5);
        assert!(config.tracking.allow_skipped_statuses);
        assert_eq!(config.tracking.max_recorded_rejections, 64);
        assert_eq!(config.tracking.max_cached_shipments, 1024);
    }

    #[test]
    fn test_optional_keys_default() {
        let toml = r#"
            [catalog]
            path = "carriers.json"

            [routing]
            cost_weight = 1.0
            time_weight = 0.0
        "#;
        let config = Config::from_toml(toml).unwrap();

        assert_eq!(config.worker.notification_capacity, 256);
        assert!(config.tracking.allow_skipped_statuses);
        assert_eq!(config.tracking.max_recorded_rejections, 64);
    }

    #[test]
    fn test_missing_section_is_an_error() {
        assert!(Config::from_toml("[worker]\nnotification_capacity = 8\n").is_err());
    }
}
