//! Run configuration, loaded from TOML.
//!
//! ```toml
//! [similarity]
//! max_depth = 3
//! [similarity.functionality]
//! "http://example.org/treats" = 2
//!
//! [calibration]
//! target_similarity = 0.75
//! seed = 42
//!
//! [pairing]
//! mode = "free"
//! proportion = 0.05
//!
//! [metric]
//! z = 1.96
//! ```
//!
//! Every table and field is optional.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::calibrate::CalibrationConfig;
use crate::error::{ConfigError, DcrResult};
use crate::metric::MetricConfig;
use crate::pairs::PairingMode;
use crate::similarity::SimilarityConfig;

/// How matched pairs are extracted.
///
/// An explicit `threshold` wins over `proportion`; with neither set the
/// threshold is calibrated from the data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    pub mode: PairingMode,
    pub threshold: Option<f64>,
    pub proportion: Option<f64>,
}

impl PairingConfig {
    pub fn validate(&self) -> DcrResult<()> {
        if let Some(t) = self.threshold {
            if !t.is_finite() || t < 0.0 {
                return Err(invalid("pairing.threshold", format!("{t} is not a distance")));
            }
        }
        if let Some(p) = self.proportion {
            if !(0.0..=1.0).contains(&p) {
                return Err(invalid("pairing.proportion", format!("{p} is outside [0, 1]")));
            }
        }
        Ok(())
    }
}

/// Complete configuration of a discovery run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub similarity: SimilarityConfig,
    pub calibration: CalibrationConfig,
    pub pairing: PairingConfig,
    pub metric: MetricConfig,
}

impl DiscoveryConfig {
    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> DcrResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> DcrResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> DcrResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| {
            ConfigError::Io {
                path: path.display().to_string(),
                source: e,
            }
            .into()
        })
    }

    /// Check every section. The functionality map may be left empty when the
    /// run never scores similarity.
    pub fn validate(&self) -> DcrResult<()> {
        if !self.similarity.functionality.is_empty() {
            self.similarity.validate()?;
        }
        self.calibration.validate()?;
        self.pairing.validate()?;
        self.metric.validate()
    }
}

fn invalid(field: &'static str, message: String) -> crate::error::DcrError {
    ConfigError::Invalid { field, message }.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Entity;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = DiscoveryConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.similarity.max_depth, 4);
        assert_eq!(cfg.calibration.sample_size, 200);
        assert_eq!(cfg.calibration.intervals, 20);
        assert_eq!(cfg.pairing.mode, PairingMode::Free);
        assert_eq!(cfg.metric.z, 1.96);
    }

    #[test]
    fn parses_sections() {
        let cfg = DiscoveryConfig::from_toml_str(
            r#"
            [similarity]
            max_depth = 2
            properties = "present"
            [similarity.functionality]
            "http://example.org/treats" = 3

            [pairing]
            mode = "cross_group"
            proportion = 0.1
            "#,
        )
        .unwrap();
        assert_eq!(cfg.similarity.max_depth, 2);
        assert_eq!(
            cfg.similarity
                .functionality
                .get(&Entity::new("http://example.org/treats")),
            Some(&3)
        );
        assert_eq!(cfg.pairing.mode, PairingMode::CrossGroup);
        assert_eq!(cfg.pairing.proportion, Some(0.1));
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(DiscoveryConfig::from_toml_str("[pairing]\nproportion = 1.5").is_err());
        assert!(DiscoveryConfig::from_toml_str("[metric]\nz = -1.0").is_err());
        assert!(DiscoveryConfig::from_toml_str("[calibration]\nintervals = 0").is_err());
        assert!(
            DiscoveryConfig::from_toml_str("[similarity.functionality]\np = 0").is_err()
        );
    }

    #[test]
    fn reports_parse_errors() {
        let err = DiscoveryConfig::from_toml_str("[pairing\nmode = 1").unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn config_roundtrip_toml() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("run.toml");

        let mut cfg = DiscoveryConfig::default();
        cfg.calibration.seed = Some(9);
        cfg.pairing.threshold = Some(0.5);
        cfg.save(&path).unwrap();

        let loaded = DiscoveryConfig::from_file(&path).unwrap();
        assert_eq!(loaded.calibration.seed, Some(9));
        assert_eq!(loaded.pairing.threshold, Some(0.5));
    }
}
