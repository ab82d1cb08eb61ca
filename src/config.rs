//! # Simulation Configuration
//!
//! ## Responsibility
//! Parse and validate the TOML configuration that selects the routing
//! algorithm and its parameters. Every field has a documented default, so
//! an empty file (or no file at all) yields a working configuration.
//!
//! ## NOT Responsible For
//! - Constructing the model (see `process`)
//! - CSV input parsing (see `process::input`)

use crate::routing::{
    BackPropagationAlgorithm, LocalSharedSliceAlgorithm, LocalSliceAlgorithm,
    LocalWeightedSliceAlgorithm, OriginalAlgorithm, RoutingAlgorithm, SharedGlobalAlgorithm,
    SharedMultiZoneAlgorithm,
};
use crate::RoutingError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

// ── Default value functions ──────────────────────────────────────────────

/// Default routing algorithm.
fn default_algorithm() -> String {
    "Local".to_string()
}

/// Default endpoints per slice.
fn default_slice_capacity() -> i64 {
    100
}

/// Default routing weight of the global slice group.
fn default_global_weight() -> f64 {
    0.4
}

/// Default total-endpoint threshold below which everything stays global.
fn default_global_threshold() -> i64 {
    100
}

/// Default deviation threshold of the local algorithm.
fn default_local_threshold() -> f64 {
    0.2
}

/// Default deviation threshold of the local-shared algorithm.
fn default_local_shared_threshold() -> f64 {
    0.5
}

/// Default in-zone traffic reward coefficient.
fn default_in_zone_coeff() -> f64 {
    0.5
}

/// Default deviation penalty coefficient.
fn default_dev_coeff() -> f64 {
    0.3
}

/// Default gradient-ascent round count.
fn default_max_round() -> usize {
    100
}

fn default_true() -> bool {
    true
}

// ── Sections ─────────────────────────────────────────────────────────────

/// Parameters of the shared-global algorithm family.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SharedGlobalConfig {
    /// Routing weight of the global slice group.
    #[serde(default = "default_global_weight")]
    pub global_weight: f64,
    /// Total endpoints at or below which everything stays global.
    #[serde(default = "default_global_threshold")]
    pub global_threshold: i64,
    /// Stop contributing zones from consuming the global group.
    #[serde(default)]
    pub exclude_contributor: bool,
}

impl Default for SharedGlobalConfig {
    fn default() -> Self {
        Self {
            global_weight: default_global_weight(),
            global_threshold: default_global_threshold(),
            exclude_contributor: false,
        }
    }
}

/// Parameters of the local algorithm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalConfig {
    /// Maximum tolerated traffic load deviation per zone.
    #[serde(default = "default_local_threshold")]
    pub threshold: f64,
    /// Minimum mean endpoints per zone before the algorithm activates.
    #[serde(default)]
    pub starting_threshold: i64,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            threshold: default_local_threshold(),
            starting_threshold: 0,
        }
    }
}

/// Parameters of the local-shared algorithm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalSharedConfig {
    /// Maximum tolerated traffic load deviation per endpoint.
    #[serde(default = "default_local_shared_threshold")]
    pub threshold: f64,
}

impl Default for LocalSharedConfig {
    fn default() -> Self {
        Self {
            threshold: default_local_shared_threshold(),
        }
    }
}

/// Parameters of the back-propagation algorithm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackPropagationConfig {
    /// Reward per unit of in-zone traffic.
    #[serde(default = "default_in_zone_coeff")]
    pub in_zone_coeff: f64,
    /// Penalty per unit of load deviation.
    #[serde(default = "default_dev_coeff")]
    pub dev_coeff: f64,
    /// Rounds of gradient ascent.
    #[serde(default = "default_max_round")]
    pub max_round: usize,
    /// Use the squared deviation (L2) instead of the absolute one (L1).
    #[serde(default = "default_true")]
    pub use_l2_norm: bool,
}

impl Default for BackPropagationConfig {
    fn default() -> Self {
        Self {
            in_zone_coeff: default_in_zone_coeff(),
            dev_coeff: default_dev_coeff(),
            max_round: default_max_round(),
            use_l2_norm: true,
        }
    }
}

// ── Top-level config ─────────────────────────────────────────────────────

/// Root configuration: algorithm selection plus per-algorithm parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationConfig {
    /// Canonical algorithm name (`Original`, `SharedGlobal`,
    /// `SharedMultiZone`, `Local`, `LocalWeighted`, `LocalShared`,
    /// `BackPropagation`).
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    /// Endpoints per packaged slice.
    #[serde(default = "default_slice_capacity")]
    pub slice_capacity: i64,
    #[serde(default)]
    pub shared_global: SharedGlobalConfig,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub local_shared: LocalSharedConfig,
    #[serde(default)]
    pub back_propagation: BackPropagationConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            slice_capacity: default_slice_capacity(),
            shared_global: SharedGlobalConfig::default(),
            local: LocalConfig::default(),
            local_shared: LocalSharedConfig::default(),
            back_propagation: BackPropagationConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Parse a configuration from TOML text and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self, RoutingError> {
        let config: SimulationConfig = toml::from_str(text)
            .map_err(|e| RoutingError::InvalidParameter(format!("config parse: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RoutingError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check the semantic constraints serde cannot express.
    pub fn validate(&self) -> Result<(), RoutingError> {
        if self.slice_capacity <= 0 {
            return Err(RoutingError::InvalidParameter(format!(
                "slice capacity must be positive, got {}",
                self.slice_capacity
            )));
        }
        if self.shared_global.global_weight < 0.0 {
            return Err(RoutingError::InvalidParameter(format!(
                "global weight must be >= 0, got {}",
                self.shared_global.global_weight
            )));
        }
        if self.shared_global.global_threshold < 0 {
            return Err(RoutingError::InvalidParameter(format!(
                "global threshold must be >= 0, got {}",
                self.shared_global.global_threshold
            )));
        }
        if self.local.threshold < 0.0 {
            return Err(RoutingError::InvalidParameter(format!(
                "local threshold must be >= 0, got {}",
                self.local.threshold
            )));
        }
        if self.local.starting_threshold < 0 {
            return Err(RoutingError::InvalidParameter(format!(
                "starting threshold must be >= 0, got {}",
                self.local.starting_threshold
            )));
        }
        if self.local_shared.threshold < 0.0 {
            return Err(RoutingError::InvalidParameter(format!(
                "local shared threshold must be >= 0, got {}",
                self.local_shared.threshold
            )));
        }
        Ok(())
    }

    /// Construct the configured routing algorithm. Unknown names log a
    /// warning and fall back to the local algorithm.
    pub fn build_algorithm(
        &self,
    ) -> Result<Box<dyn RoutingAlgorithm + Send + Sync>, RoutingError> {
        let alg: Box<dyn RoutingAlgorithm + Send + Sync> = match self.algorithm.as_str() {
            "Original" | "OriginalAlgorithm" => Box::new(OriginalAlgorithm),
            "SharedGlobal" | "SharedGlobalAlgorithm" => {
                if self.shared_global.exclude_contributor {
                    Box::new(SharedMultiZoneAlgorithm::new(
                        self.shared_global.global_weight,
                        self.shared_global.global_threshold,
                    )?)
                } else {
                    Box::new(SharedGlobalAlgorithm::new(
                        self.shared_global.global_weight,
                        self.shared_global.global_threshold,
                    )?)
                }
            }
            "SharedMultiZone" | "SharedMultiZoneAlgorithm" => {
                Box::new(SharedMultiZoneAlgorithm::new(
                    self.shared_global.global_weight,
                    self.shared_global.global_threshold,
                )?)
            }
            "Local" | "LocalAlgorithm" | "LocalSliceAlgorithm" => Box::new(
                LocalSliceAlgorithm::new(self.local.threshold, self.local.starting_threshold)?,
            ),
            "LocalWeighted" | "LocalWeightedSliceAlgorithm" => {
                Box::new(LocalWeightedSliceAlgorithm)
            }
            "LocalShared" | "LocalSharedSliceAlgorithm" => {
                Box::new(LocalSharedSliceAlgorithm::new(self.local_shared.threshold)?)
            }
            "BackPropagation" | "BackPropagationAlgorithm" => {
                Box::new(BackPropagationAlgorithm::new(
                    self.back_propagation.in_zone_coeff,
                    self.back_propagation.dev_coeff,
                    self.back_propagation.max_round,
                    self.back_propagation.use_l2_norm,
                ))
            }
            other => {
                warn!(algorithm = other, "unknown algorithm, using the local slice algorithm");
                Box::new(LocalSliceAlgorithm::new(
                    self.local.threshold,
                    self.local.starting_threshold,
                )?)
            }
        };
        Ok(alg)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
