//! Router configuration
//!
//! Settings are read from a TOML document in which each component owns a
//! namespace table:
//!
//! ```toml
//! [ProphetEnergyRouter]
//! secondsPerTimeUnit = 30
//! beta = 0.25
//! thresholdEnergy = 10
//! thresholdProbability = 0.5
//!
//! [Energy]
//! initialEnergy = 5000
//! discoveryCost = 0.1
//! ```
//!
//! `secondsPerTimeUnit`, `thresholdEnergy` and `thresholdProbability` are
//! mandatory. A router cannot be built without them.

use std::path::Path;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::admission::AdmissionThresholds;
use crate::energy::EnergyConfig;
use crate::error::ConfigError;
use crate::prophet::{
    DEFAULT_AGING_CONSTANT, DEFAULT_INITIAL_PROBABILITY, DEFAULT_TRANSITIVITY_CONSTANT,
    ProphetConfig,
};

/// Namespace of the router settings table
pub const ROUTER_NAMESPACE: &str = "ProphetEnergyRouter";

/// Namespace of the energy settings table
pub const ENERGY_NAMESPACE: &str = "Energy";

/// Raw router settings, as written in a settings file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterSettings {
    pub seconds_per_time_unit: Option<f64>,
    pub beta: Option<f64>,
    pub threshold_energy: Option<f64>,
    pub threshold_probability: Option<f64>,
    pub initial_probability: Option<f64>,
    pub aging_constant: Option<f64>,
}

impl RouterSettings {
    /// Read the router table from a TOML document
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        Self::from_toml_str_in(document, ROUTER_NAMESPACE)
    }

    /// Read the router table stored under `namespace`
    pub fn from_toml_str_in(document: &str, namespace: &str) -> Result<Self, ConfigError> {
        namespace_table(document, namespace)
    }

    /// Read the router table from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let document = std::fs::read_to_string(path)?;
        Self::from_toml_str(&document)
    }
}

/// Read the energy table from a TOML document, defaulting when absent
pub fn energy_config_from_toml_str(document: &str) -> Result<EnergyConfig, ConfigError> {
    match namespace_table(document, ENERGY_NAMESPACE) {
        Err(ConfigError::MissingNamespace(_)) => Ok(EnergyConfig::default()),
        other => other,
    }
}

fn namespace_table<T: DeserializeOwned>(document: &str, namespace: &str) -> Result<T, ConfigError> {
    let mut root: toml::Table = toml::from_str(document)?;
    let table = root
        .remove(namespace)
        .ok_or_else(|| ConfigError::MissingNamespace(namespace.to_string()))?;
    Ok(table.try_into()?)
}

/// Validated, immutable router configuration
///
/// Each router owns its own copy; replicas receive a clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// PRoPHET protocol parameters
    pub prophet: ProphetConfig,
    /// Admission thresholds
    pub thresholds: AdmissionThresholds,
}

impl RouterConfig {
    /// Build a configuration from explicit values with standard constants
    pub fn new(
        seconds_per_time_unit: f64,
        threshold_energy: f64,
        threshold_probability: f64,
    ) -> Result<Self, ConfigError> {
        Self::from_settings(&RouterSettings {
            seconds_per_time_unit: Some(seconds_per_time_unit),
            threshold_energy: Some(threshold_energy),
            threshold_probability: Some(threshold_probability),
            ..Default::default()
        })
    }

    /// Validate raw settings
    pub fn from_settings(settings: &RouterSettings) -> Result<Self, ConfigError> {
        let seconds_per_time_unit = require(settings.seconds_per_time_unit, "secondsPerTimeUnit")?;
        if !(seconds_per_time_unit.is_finite() && seconds_per_time_unit > 0.0) {
            return Err(ConfigError::InvalidSetting {
                key: "secondsPerTimeUnit",
                reason: format!("must be a positive number, got {}", seconds_per_time_unit),
            });
        }

        let threshold_energy = require(settings.threshold_energy, "thresholdEnergy")?;
        let threshold_probability =
            require(settings.threshold_probability, "thresholdProbability")?;
        finite(threshold_energy, "thresholdEnergy")?;
        finite(threshold_probability, "thresholdProbability")?;

        let beta = unit_interval(
            settings.beta.unwrap_or(DEFAULT_TRANSITIVITY_CONSTANT),
            "beta",
        )?;
        let initial_probability = unit_interval(
            settings.initial_probability.unwrap_or(DEFAULT_INITIAL_PROBABILITY),
            "initialProbability",
        )?;
        let aging_constant = unit_interval(
            settings.aging_constant.unwrap_or(DEFAULT_AGING_CONSTANT),
            "agingConstant",
        )?;

        Ok(Self {
            prophet: ProphetConfig {
                initial_probability,
                aging_constant,
                transitivity_constant: beta,
                seconds_per_time_unit,
            },
            thresholds: AdmissionThresholds {
                energy: threshold_energy,
                probability: threshold_probability,
            },
        })
    }

    /// Load and validate the router table of a TOML document
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        Self::from_settings(&RouterSettings::from_toml_str(document)?)
    }

    /// Load and validate the router table of a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_settings(&RouterSettings::from_toml_file(path)?)
    }

    /// Transitivity constant (beta)
    pub fn beta(&self) -> f64 {
        self.prophet.transitivity_constant
    }

    pub fn seconds_per_time_unit(&self) -> f64 {
        self.prophet.seconds_per_time_unit
    }
}

fn require(value: Option<f64>, key: &'static str) -> Result<f64, ConfigError> {
    value.ok_or(ConfigError::MissingSetting { key })
}

fn finite(value: f64, key: &'static str) -> Result<f64, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::InvalidSetting {
            key,
            reason: format!("must be finite, got {}", value),
        })
    }
}

fn unit_interval(value: f64, key: &'static str) -> Result<f64, ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidSetting {
            key,
            reason: format!("must lie within [0, 1], got {}", value),
        })
    }
}
