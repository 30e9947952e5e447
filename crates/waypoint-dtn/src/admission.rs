//! Transfer admission policy
//!
//! Gates epidemic forwarding of a buffered message on three conditions, all
//! of which must hold:
//!
//! - the probability-to-destination reaches `threshold_probability`
//! - the node has energy and at least `threshold_energy` of it
//! - the message fits in the node's free buffer
//!
//! Every condition is checked on every evaluation, so a denial lists every
//! failing condition. Evaluation has no side effects: callers decide how to
//! report the returned [`AdmissionDecision`].
//!
//! The probability-to-destination is read from the *connected peers'*
//! snapshots, not from the node's own table. With several peers connected the
//! lowest value counts.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use waypoint_core::NodeIdentity;

use crate::energy::EnergyState;
use crate::engine::Message;
use crate::prophet::PredictabilitySnapshot;

/// Thresholds applied by the admission policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdmissionThresholds {
    /// Minimum remaining energy
    pub energy: f64,
    /// Minimum probability-to-destination
    pub probability: f64,
}

/// Reason a message was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Probability-to-destination is below the threshold
    ProbabilityBelowThreshold,
    /// No energy model, depleted, or below the energy threshold
    InsufficientEnergy,
    /// Message does not fit in the free buffer
    InsufficientBuffer,
}

impl DenyReason {
    /// Stable machine-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::ProbabilityBelowThreshold => "probability_below_threshold",
            DenyReason::InsufficientEnergy => "insufficient_energy",
            DenyReason::InsufficientBuffer => "insufficient_buffer",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered set of failing conditions
pub type DenyReasons = BTreeSet<DenyReason>;

/// Values an admission decision was made from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdmissionInputs {
    pub probability_to_destination: f64,
    pub energy: EnergyState,
    pub message_size: u64,
    pub free_buffer: u64,
    pub thresholds: AdmissionThresholds,
}

/// Outcome of evaluating one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AdmissionDecision {
    /// All conditions hold
    Admitted { inputs: AdmissionInputs },
    /// At least one condition failed
    Denied {
        inputs: AdmissionInputs,
        reasons: DenyReasons,
    },
}

impl AdmissionDecision {
    /// Check if the message may be forwarded
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionDecision::Admitted { .. })
    }

    /// Inputs the decision was based on
    pub fn inputs(&self) -> &AdmissionInputs {
        match self {
            AdmissionDecision::Admitted { inputs } => inputs,
            AdmissionDecision::Denied { inputs, .. } => inputs,
        }
    }

    /// Failing conditions (empty when admitted)
    pub fn reasons(&self) -> Vec<DenyReason> {
        match self {
            AdmissionDecision::Admitted { .. } => Vec::new(),
            AdmissionDecision::Denied { reasons, .. } => reasons.iter().copied().collect(),
        }
    }

    /// Check if a specific condition failed
    pub fn has_reason(&self, reason: DenyReason) -> bool {
        match self {
            AdmissionDecision::Admitted { .. } => false,
            AdmissionDecision::Denied { reasons, .. } => reasons.contains(&reason),
        }
    }
}

/// Probability/energy/buffer admission gate
#[derive(Debug, Clone)]
pub struct TransferAdmissionPolicy {
    thresholds: AdmissionThresholds,
}

impl TransferAdmissionPolicy {
    /// Create a policy with per-node thresholds
    pub fn new(thresholds: AdmissionThresholds) -> Self {
        Self { thresholds }
    }

    /// Get the thresholds
    pub fn thresholds(&self) -> &AdmissionThresholds {
        &self.thresholds
    }

    /// Probability-to-destination as seen through the connected peers
    ///
    /// Each peer contributes its snapshot entry for `destination` if the entry
    /// lies within `[0, 1]`, otherwise 0. The lowest contribution wins. With no
    /// connected peer the result is 0.
    pub fn probability_to_destination<I: NodeIdentity>(
        &self,
        destination: &I,
        connected: &[PredictabilitySnapshot<I>],
    ) -> f64 {
        connected
            .iter()
            .map(|snapshot| snapshot.valid_probability(destination).unwrap_or(0.0))
            .reduce(f64::min)
            .unwrap_or(0.0)
    }

    /// Evaluate one candidate message
    pub fn evaluate<I: NodeIdentity>(
        &self,
        message: &Message<I>,
        probability_to_destination: f64,
        energy: EnergyState,
        free_buffer: u64,
    ) -> AdmissionDecision {
        let inputs = AdmissionInputs {
            probability_to_destination,
            energy,
            message_size: message.size,
            free_buffer,
            thresholds: self.thresholds,
        };

        let mut reasons = DenyReasons::new();

        // Written as negated admit conditions so NaN inputs deny
        if !(probability_to_destination >= self.thresholds.probability) {
            reasons.insert(DenyReason::ProbabilityBelowThreshold);
        }
        if !(energy.has_energy && energy.current >= self.thresholds.energy) {
            reasons.insert(DenyReason::InsufficientEnergy);
        }
        if message.size > free_buffer {
            reasons.insert(DenyReason::InsufficientBuffer);
        }

        if reasons.is_empty() {
            AdmissionDecision::Admitted { inputs }
        } else {
            AdmissionDecision::Denied { inputs, reasons }
        }
    }
}
