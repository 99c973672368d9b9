//! Application and scoring configuration.
//!
//! Stored as a JSON object on disk:
//! ```json
//! {
//!   "wigle": { "bbox": { "lat1": 49.8, "lat2": 59.5, "lon1": -8.7, "lon2": 1.9 } },
//!   "scoring": { "alpha_coprobe": 0.7, "sigma_km": 10.0, "page_cap": 400 },
//!   "cache": { "path": "wigle_cache.json" },
//!   "base": { "path": "base_location.json" }
//! }
//! ```
//! Every section is optional and falls back to its defaults.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_WIGLE_BASE_URL: &str = "https://api.wigle.net/api/v2";

/// Parameters of the candidate scoring model. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Blend between co-probe agreement (1.0) and ignoring it (0.0).
    pub alpha_coprobe: f64,
    /// Width of the Gaussian proximity falloff around the base location.
    pub sigma_km: f64,
    /// Radius within which another SSID's point corroborates a candidate.
    pub coprobe_radius_m: f64,
    pub rarity_weight: f64,
    pub proximity_weight: f64,
    /// Maximum number of points requested from the provider per SSID.
    pub page_cap: usize,
    /// Lifetime of a cached provider result.
    pub ttl_hours: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            alpha_coprobe: 0.7,
            sigma_km: 10.0,
            coprobe_radius_m: 300.0,
            rarity_weight: 1.0,
            proximity_weight: 1.0,
            page_cap: 400,
            ttl_hours: 24.0,
        }
    }
}

impl ScoringConfig {
    pub fn ttl(&self) -> Duration {
        Duration::milliseconds((self.ttl_hours * 3_600_000.0).round() as i64)
    }

    pub fn coprobe_radius_km(&self) -> f64 {
        self.coprobe_radius_m / 1000.0
    }

    /// Rejects parameter bundles the scoring model is not defined for.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: String) -> Result<(), ConfigError> {
            Err(ConfigError::Invalid { field, reason })
        }

        if !(0.0..=1.0).contains(&self.alpha_coprobe) {
            return invalid("alpha_coprobe", format!("{} is outside [0, 1]", self.alpha_coprobe));
        }
        if !(self.sigma_km > 0.0 && self.sigma_km.is_finite()) {
            return invalid("sigma_km", format!("{} must be > 0", self.sigma_km));
        }
        if !(self.coprobe_radius_m > 0.0 && self.coprobe_radius_m.is_finite()) {
            return invalid("coprobe_radius_m", format!("{} must be > 0", self.coprobe_radius_m));
        }
        if !(self.rarity_weight >= 0.0 && self.rarity_weight.is_finite()) {
            return invalid("rarity_weight", format!("{} must be >= 0", self.rarity_weight));
        }
        if !(self.proximity_weight >= 0.0 && self.proximity_weight.is_finite()) {
            return invalid("proximity_weight", format!("{} must be >= 0", self.proximity_weight));
        }
        if self.page_cap == 0 {
            return invalid("page_cap", "must be > 0".to_string());
        }
        if !(self.ttl_hours > 0.0 && self.ttl_hours.is_finite()) {
            return invalid("ttl_hours", format!("{} must be > 0", self.ttl_hours));
        }
        Ok(())
    }
}

/// Rectangle constraining provider searches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat1: f64,
    pub lat2: f64,
    pub lon1: f64,
    pub lon2: f64,
}

impl BoundingBox {
    /// Canonical text form used to scope cached results.
    pub fn scope(&self) -> String {
        format!("bbox:{}:{}:{}:{}", self.lat1, self.lat2, self.lon1, self.lon2)
    }
}

/// Cache scope for an optional bounding box.
pub fn cache_scope(bbox: Option<&BoundingBox>) -> String {
    bbox.map_or_else(|| "global".to_string(), BoundingBox::scope)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WigleConfig {
    pub base_url: String,
    pub bbox: Option<BoundingBox>,
}

impl Default for WigleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_WIGLE_BASE_URL.to_string(),
            bbox: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// `None` keeps the data in memory only.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub wigle: WigleConfig,
    pub scoring: ScoringConfig,
    pub cache: PathConfig,
    pub base: PathConfig,
    /// Maximum number of provider lookups in flight for one device.
    pub fetch_concurrency: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            wigle: WigleConfig::default(),
            scoring: ScoringConfig::default(),
            cache: PathConfig {
                path: Some("wigle_cache.json".to_string()),
            },
            base: PathConfig {
                path: Some("base_location.json".to_string()),
            },
            fetch_concurrency: 4,
        }
    }
}

impl AppConfig {
    /// Loads and validates the config at `path`. A missing file yields defaults.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let cfg = if Path::new(path).exists() {
            let content = std::fs::read_to_string(path)?;
            debug!(path, "Loaded config file");
            serde_json::from_str::<AppConfig>(&content)?
        } else {
            info!(path, "Config file not found, using defaults");
            AppConfig::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring.validate()?;
        if self.fetch_concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "fetch_concurrency",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    #[test]
    fn test_default_scoring_config_is_valid() {
        assert!(ScoringConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_alpha_rejected() {
        let cfg = ScoringConfig {
            alpha_coprobe: 1.5,
            ..Default::default()
        };
        match cfg.validate() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "alpha_coprobe"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_non_positive_sigma_rejected() {
        for sigma in [0.0, -1.0, f64::NAN] {
            let cfg = ScoringConfig {
                sigma_km: sigma,
                ..Default::default()
            };
            assert!(cfg.validate().is_err(), "sigma {sigma} accepted");
        }
    }

    #[test]
    fn test_zero_page_cap_rejected() {
        let cfg = ScoringConfig {
            page_cap: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_ttl_conversion() {
        let cfg = ScoringConfig {
            ttl_hours: 1.5,
            ..Default::default()
        };
        assert_eq!(cfg.ttl(), Duration::minutes(90));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let cfg = AppConfig::load(&temp_path("probe_locator_no_such_config.json")).unwrap();
        assert_eq!(cfg.scoring, ScoringConfig::default());
        assert!(cfg.wigle.bbox.is_none());
    }

    #[test]
    fn test_load_partial_file() {
        let path = temp_path("probe_locator_test_partial_config.json");
        fs::write(
            &path,
            r#"{"scoring": {"sigma_km": 25.0}, "wigle": {"bbox": {"lat1": 1.0, "lat2": 2.0, "lon1": 3.0, "lon2": 4.0}}}"#,
        )
        .unwrap();

        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.scoring.sigma_km, 25.0);
        assert_eq!(cfg.scoring.page_cap, 400);
        assert_eq!(cfg.wigle.base_url, DEFAULT_WIGLE_BASE_URL);
        assert_eq!(cache_scope(cfg.wigle.bbox.as_ref()), "bbox:1:2:3:4");

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let path = temp_path("probe_locator_test_invalid_config.json");
        fs::write(&path, r#"{"scoring": {"alpha_coprobe": -0.1}}"#).unwrap();

        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::Invalid { field: "alpha_coprobe", .. })
        ));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let path = temp_path("probe_locator_test_malformed_config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Parse(_))));

        fs::remove_file(&path).unwrap();
    }
}
