//! # Waypoint Core
//!
//! Core traits, types, and errors shared by the Waypoint crates.
//!
//! The forwarding core is written against these abstractions so the same
//! routing logic runs inside a discrete-event simulator (char identities,
//! manually advanced clock) or any other host that can supply node ids and a
//! monotonic notion of simulated time.
//!
//! ## Key Traits
//!
//! - [`NodeIdentity`]: Abstraction over node identification
//! - [`SimClock`]: Simulated time source, in seconds
//!
//! ## Key Types
//!
//! - [`SimulationIdentity`]: Char-based identity used by simulations and tests
//! - [`ManualClock`]: Clock advanced explicitly by the scheduler

pub mod clock;
pub mod error;
pub mod identity;

pub use clock::*;
pub use error::*;
pub use identity::*;
