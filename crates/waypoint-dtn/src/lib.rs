//! # Waypoint DTN
//!
//! Forwarding decisions for delay-tolerant networks of intermittently
//! connected, battery-powered nodes.
//!
//! Each node runs a [`ProphetEnergyRouter`] that combines two ideas:
//!
//! - **PRoPHET delivery predictability**: every node keeps a per-peer belief
//!   that it will meet that peer again, raised on direct encounters, decayed
//!   over simulated time, and propagated transitively from peers' beliefs.
//!
//! - **Energy-aware epidemic forwarding**: a buffered message is flooded to
//!   all connected peers only when the connected peers are likely enough to
//!   reach its destination, the node has enough energy left, and the message
//!   fits in the free buffer.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use waypoint_core::SimulationIdentity;
//! use waypoint_dtn::{BatteryModel, EnergyConfig, ProphetEnergyRouter, RouterConfig};
//!
//! let config = RouterConfig::from_toml_file("settings.toml")?;
//! let mut router = ProphetEnergyRouter::new(SimulationIdentity('A'), config, 0.0)
//!     .with_energy(Box::new(BatteryModel::new(EnergyConfig::default())));
//!
//! // On every contact change
//! router.handle_contact(&contact, &mut directory, now)?;
//!
//! // On every scheduler tick
//! let outcome = router.update(&mut engine, &mut directory, now)?;
//! ```
//!
//! ## Architecture
//!
//! - [`prophet`]: Delivery predictability table and peer snapshots
//! - [`energy`]: Energy capability and a battery model
//! - [`contact`]: Contact-up / contact-down handling
//! - [`admission`]: Probability/energy/buffer admission gate
//! - [`engine`]: Traits the host's transfer engine and peer registry implement
//! - [`router`]: The per-tick routing decision loop
//! - [`config`]: Settings loading and validation
//! - [`observe`]: Router events for hosts and tests
//! - [`error`]: Error types

pub mod admission;
pub mod config;
pub mod contact;
pub mod energy;
pub mod engine;
pub mod error;
pub mod observe;
pub mod prophet;
pub mod router;

// Re-export main types
pub use admission::{
    AdmissionDecision, AdmissionInputs, AdmissionThresholds, DenyReason, DenyReasons,
    TransferAdmissionPolicy,
};
pub use config::{
    ENERGY_NAMESPACE, ROUTER_NAMESPACE, RouterConfig, RouterSettings, energy_config_from_toml_str,
};
pub use contact::{Contact, ContactEventHandler, ContactOutcome};
pub use energy::{BatteryModel, EnergyConfig, EnergyModel, EnergyState};
pub use engine::{Message, MessageId, PeerDirectory, TransferEngine};
pub use error::{ConfigError, RouterError, RouterResult};
pub use observe::{RecordingObserver, RouterEvent, RouterObserver};
pub use prophet::{
    PredictabilityProvider, PredictabilitySnapshot, PredictabilityTable, ProphetConfig,
};
pub use router::{ProphetEnergyRouter, TickOutcome};
