//! Scoring weights
//!
//! ## Configuration file
//!
//! ```yaml
//! floor: 10
//! weights:
//!   tier1:
//!     repo_gpgcheck_disabled_penalty: 5
//!   tier2:
//!     unsigned_per_package_penalty: 3
//!     unsigned_cap: 30
//!     shadowing_per_bin_penalty: 1
//!     shadowing_cap: 15
//! ```
//!
//! Every key is optional. A tier without a table, or a table missing some
//! keys, falls back to the built-in defaults for those keys. A cap set to
//! `null` removes the cap.

use crate::error::WeightsError;
use crate::report::Tier;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Lowest score any report can receive
pub const DEFAULT_FLOOR: u8 = 10;

/// Per-signal weights for one tier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TierWeights {
    pub repo_gpgcheck_disabled_penalty: f64,
    pub repo_plaintext_transport_penalty: f64,
    /// Cap on the sum of all repository penalties; uncapped by default
    pub repo_cap: Option<f64>,
    pub unsigned_per_package_penalty: f64,
    pub unsigned_cap: Option<f64>,
    pub shadowing_per_bin_penalty: f64,
    pub shadowing_cap: Option<f64>,
    pub manual_world_writable_per_file_penalty: f64,
    pub manual_world_writable_cap: Option<f64>,
    /// ELF count above which an area is penalized
    pub manual_elf_threshold: u64,
    pub manual_elf_penalty: f64,
}

impl Default for TierWeights {
    fn default() -> Self {
        Self {
            repo_gpgcheck_disabled_penalty: 5.0,
            repo_plaintext_transport_penalty: 2.0,
            repo_cap: None,
            unsigned_per_package_penalty: 3.0,
            unsigned_cap: Some(30.0),
            shadowing_per_bin_penalty: 1.0,
            shadowing_cap: Some(15.0),
            manual_world_writable_per_file_penalty: 1.0,
            manual_world_writable_cap: Some(10.0),
            manual_elf_threshold: 50,
            manual_elf_penalty: 5.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TierTable {
    #[serde(default)]
    pub tier1: Option<TierWeights>,
    #[serde(default)]
    pub tier2: Option<TierWeights>,
}

/// Weight configuration for every tier plus the score floor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightConfig {
    #[serde(default = "default_floor")]
    pub floor: u8,
    #[serde(default)]
    pub weights: TierTable,
}

fn default_floor() -> u8 {
    DEFAULT_FLOOR
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            floor: DEFAULT_FLOOR,
            weights: TierTable::default(),
        }
    }
}

impl WeightConfig {
    /// Weights for `tier`, each tier reading only its own table
    pub fn for_tier(&self, tier: Tier) -> TierWeights {
        let table = match tier {
            Tier::One => &self.weights.tier1,
            Tier::Two => &self.weights.tier2,
        };
        table.clone().unwrap_or_default()
    }

    /// Configured floor if it lies in `1..=100`, the default otherwise
    pub fn effective_floor(&self) -> u8 {
        if (1..=100).contains(&self.floor) {
            self.floor
        } else {
            DEFAULT_FLOOR
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml_ng::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(content)
    }

    pub fn from_file(path: &Path) -> Result<Self, WeightsError> {
        let content = std::fs::read_to_string(path).map_err(|source| WeightsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&content).map_err(|source| WeightsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if config.effective_floor() != config.floor {
            warn!(
                "Floor {} in {} is outside 1..=100, using {}",
                config.floor,
                path.display(),
                DEFAULT_FLOOR
            );
        }
        Ok(config)
    }

    /// Load weights, never failing
    ///
    /// No path or a missing file gives the built-in defaults. A file that
    /// cannot be read or parsed is logged and also gives the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            debug!("No weight configuration given, using built-in defaults");
            return Self::default();
        };
        if !path.exists() {
            debug!("Weight configuration {} not found, using built-in defaults", path.display());
            return Self::default();
        }

        match Self::from_file(path) {
            Ok(config) => {
                info!("Loaded scoring weights from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{}: {}, using built-in defaults", e, error_source(&e));
                Self::default()
            }
        }
    }
}

fn error_source(e: &WeightsError) -> String {
    match e {
        WeightsError::Read { source, .. } => source.to_string(),
        WeightsError::Parse { source, .. } => source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_partial_tier_table_keeps_other_defaults() {
        let config = WeightConfig::from_yaml_str(
            "weights:\n  tier2:\n    shadowing_per_bin_penalty: 0.5\n    shadowing_cap: null\n",
        )
        .unwrap();

        let tier2 = config.for_tier(Tier::Two);
        assert_eq!(tier2.shadowing_per_bin_penalty, 0.5);
        assert_eq!(tier2.shadowing_cap, None);
        assert_eq!(tier2.unsigned_cap, Some(30.0));
        assert_eq!(config.floor, DEFAULT_FLOOR);
    }

    #[test]
    fn test_tier_one_does_not_read_tier_two_table() {
        let config = WeightConfig::from_yaml_str(
            "weights:\n  tier2:\n    repo_gpgcheck_disabled_penalty: 40\n",
        )
        .unwrap();

        assert_eq!(config.for_tier(Tier::One), TierWeights::default());
        assert_eq!(config.for_tier(Tier::Two).repo_gpgcheck_disabled_penalty, 40.0);
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(WeightConfig::from_yaml_str("  \n").unwrap(), WeightConfig::default());
    }

    #[test]
    fn test_invalid_floor_uses_default() {
        let config = WeightConfig::from_yaml_str("floor: 0\n").unwrap();
        assert_eq!(config.effective_floor(), DEFAULT_FLOOR);

        let config = WeightConfig::from_yaml_str("floor: 25\n").unwrap();
        assert_eq!(config.effective_floor(), 25);
    }

    #[test]
    fn test_unparsable_file_falls_back() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("scoring.yaml");
        std::fs::write(&path, "weights: [this is: not valid").unwrap();

        assert!(matches!(
            WeightConfig::from_file(&path),
            Err(WeightsError::Parse { .. })
        ));
        assert_eq!(WeightConfig::load_or_default(Some(&path)), WeightConfig::default());
    }

    #[test]
    fn test_missing_file_is_default() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("absent.yaml");
        assert!(matches!(WeightConfig::from_file(&path), Err(WeightsError::Read { .. })));
        assert_eq!(WeightConfig::load_or_default(Some(&path)), WeightConfig::default());
        assert_eq!(WeightConfig::load_or_default(None), WeightConfig::default());
    }
}
