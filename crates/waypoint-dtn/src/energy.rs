//! Node energy model
//!
//! Energy is an optional capability. A node that carries an energy model pays
//! a discovery cost whenever a peer initiates a contact with it, and its
//! remaining energy gates epidemic forwarding.
//!
//! The forwarding core only queries energy and charges discovery. Transmission
//! and scanning costs belong to the transfer engine, which can use
//! [`EnergyModel::reduce`].

use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Energy capability of a node
pub trait EnergyModel: Debug + Send {
    /// Whether the node has any energy left
    fn has_energy(&self) -> bool;

    /// Remaining energy
    fn current(&self) -> f64;

    /// Charge the fixed cost of answering a peer's discovery
    fn charge_discovery_cost(&mut self);

    /// Consume an arbitrary amount of energy
    fn reduce(&mut self, amount: f64);

    /// A fresh model with the same configuration, at full charge
    fn replicate(&self) -> Box<dyn EnergyModel>;
}

/// Point-in-time view of a node's energy, as seen by the admission policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyState {
    /// Whether an energy model is present and not depleted
    pub has_energy: bool,
    /// Remaining energy (0 without an energy model)
    pub current: f64,
}

impl EnergyState {
    /// State of a node without an energy model
    pub fn absent() -> Self {
        Self {
            has_energy: false,
            current: 0.0,
        }
    }

    /// Read the state of an optional model
    pub fn of(model: Option<&dyn EnergyModel>) -> Self {
        match model {
            Some(model) => Self {
                has_energy: model.has_energy(),
                current: model.current(),
            },
            None => Self::absent(),
        }
    }
}

/// Battery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EnergyConfig {
    /// Energy at node start
    /// Default: 5000.0
    pub initial_energy: f64,

    /// Cost charged to the responding side of a discovered contact
    /// Default: 0.1
    pub discovery_cost: f64,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            initial_energy: 5000.0,
            discovery_cost: 0.1,
        }
    }
}

/// Finite battery that never drops below zero
#[derive(Debug, Clone)]
pub struct BatteryModel {
    config: EnergyConfig,
    current: f64,
}

impl BatteryModel {
    /// Create a fully charged battery
    pub fn new(config: EnergyConfig) -> Self {
        Self {
            current: config.initial_energy,
            config,
        }
    }

    /// Create a battery with a specific remaining charge
    pub fn with_current(config: EnergyConfig, current: f64) -> Self {
        Self {
            current: current.max(0.0),
            config,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &EnergyConfig {
        &self.config
    }

    /// Whether the battery is empty
    pub fn is_depleted(&self) -> bool {
        self.current <= 0.0
    }
}

impl EnergyModel for BatteryModel {
    fn has_energy(&self) -> bool {
        !self.is_depleted()
    }

    fn current(&self) -> f64 {
        self.current
    }

    fn charge_discovery_cost(&mut self) {
        self.reduce(self.config.discovery_cost);
    }

    fn reduce(&mut self, amount: f64) {
        let before = self.current;
        self.current = (self.current - amount).max(0.0);
        if before > 0.0 && self.is_depleted() {
            debug!(consumed = amount, "Battery depleted");
        }
    }

    fn replicate(&self) -> Box<dyn EnergyModel> {
        Box::new(BatteryModel::new(self.config.clone()))
    }
}
