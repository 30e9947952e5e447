//! PRoPHET (Probabilistic Routing Protocol using History) delivery predictability
//!
//! Each node keeps a table of delivery predictabilities, one per node it has
//! ever learned about. Entries are created on first encounter and never
//! removed; they only decay.
//!
//! Key concepts:
//! - **Direct update**: `P = P_old + (1 - P_old) * P_init` on every encounter
//! - **Transitivity**: `P_ac = P_ac_old + (1 - P_ac_old) * P_ab * P_bc * beta`
//! - **Aging**: `P = P_old * gamma^k`, `k` being the elapsed simulated time
//!   units since the last aging pass
//!
//! Aging is lazy. Every read of the table ages it to the supplied time first,
//! so values are always consistent with the current simulated time.
//!
//! The update formulas do not clamp. With inputs in `[0, 1]` the results stay
//! in range, but a peer advertising out-of-range values can push local
//! entries outside it. Consumers that need a probability use
//! [`PredictabilitySnapshot::valid_probability`], which ignores such entries.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use waypoint_core::NodeIdentity;

/// Default initial probability applied on encounter (P_init)
pub const DEFAULT_INITIAL_PROBABILITY: f64 = 0.75;

/// Default aging constant (gamma)
pub const DEFAULT_AGING_CONSTANT: f64 = 0.98;

/// Default transitivity scaling factor (beta)
pub const DEFAULT_TRANSITIVITY_CONSTANT: f64 = 0.25;

/// PRoPHET protocol configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProphetConfig {
    /// Initial probability upon encounter (P_init)
    /// Default: 0.75
    pub initial_probability: f64,

    /// Aging constant for probability decay (gamma)
    /// Applied once per elapsed time unit: P_new = P_old * gamma^units
    /// Default: 0.98
    pub aging_constant: f64,

    /// Transitivity scaling factor (beta)
    /// Default: 0.25
    pub transitivity_constant: f64,

    /// Simulated seconds making up one aging time unit
    pub seconds_per_time_unit: f64,
}

impl ProphetConfig {
    /// Create a configuration with the standard protocol constants
    pub fn new(seconds_per_time_unit: f64) -> Self {
        Self {
            initial_probability: DEFAULT_INITIAL_PROBABILITY,
            aging_constant: DEFAULT_AGING_CONSTANT,
            transitivity_constant: DEFAULT_TRANSITIVITY_CONSTANT,
            seconds_per_time_unit,
        }
    }

    /// Override the transitivity constant (beta)
    pub fn with_beta(mut self, beta: f64) -> Self {
        self.transitivity_constant = beta;
        self
    }
}

/// Delivery predictability table for one node
///
/// Owned and mutated only by its node. Other nodes see it through
/// [`PredictabilityTable::snapshot`].
#[derive(Debug, Clone)]
pub struct PredictabilityTable<I: NodeIdentity> {
    /// Our node's identity
    local_id: I,
    /// Delivery predictability for each known node
    probabilities: HashMap<I, f64>,
    /// Simulated time of the last aging pass
    last_age_update: f64,
    /// Protocol configuration
    config: ProphetConfig,
}

impl<I: NodeIdentity> PredictabilityTable<I> {
    /// Create an empty table for `local_id`, created at simulated time `now`
    pub fn new(local_id: I, config: ProphetConfig, now: f64) -> Self {
        Self {
            local_id,
            probabilities: HashMap::new(),
            last_age_update: now,
            config,
        }
    }

    /// Get the local node's identity
    pub fn local_id(&self) -> &I {
        &self.local_id
    }

    /// Get the protocol configuration
    pub fn config(&self) -> &ProphetConfig {
        &self.config
    }

    /// Simulated time of the last aging pass
    pub fn last_age_update(&self) -> f64 {
        self.last_age_update
    }

    /// Number of known nodes
    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    /// Whether no node has been learned yet
    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    /// Stored values without aging them first
    pub fn entries(&self) -> impl Iterator<Item = (&I, f64)> {
        self.probabilities.iter().map(|(id, p)| (id, *p))
    }

    /// Get delivery predictability for a node, aged to `now`
    ///
    /// Returns 0.0 if the node is unknown.
    pub fn get_probability(&mut self, peer: &I, now: f64) -> f64 {
        self.age_all(now);
        self.probabilities.get(peer).copied().unwrap_or(0.0)
    }

    /// Record a direct encounter with a peer
    ///
    /// `P_new = P_old + (1 - P_old) * P_init`
    pub fn record_direct_contact(&mut self, peer: &I, now: f64) -> f64 {
        if peer == &self.local_id {
            debug!(node = %self.local_id, "Ignoring encounter with self");
            return 0.0;
        }

        let p_old = self.get_probability(peer, now);
        let p_new = p_old + (1.0 - p_old) * self.config.initial_probability;
        self.probabilities.insert(peer.clone(), p_new);

        trace!(node = %self.local_id, peer = %peer, p_old, p_new, "Direct predictability update");
        p_new
    }

    /// Age all entries to `now`
    ///
    /// A repeated call with the same time changes nothing. Time earlier than
    /// the last aging pass is ignored, and so is a non-finite time.
    pub fn age_all(&mut self, now: f64) {
        if !now.is_finite() || now <= self.last_age_update {
            return;
        }

        let elapsed_units = (now - self.last_age_update) / self.config.seconds_per_time_unit;
        let factor = self.config.aging_constant.powf(elapsed_units);

        for p in self.probabilities.values_mut() {
            *p *= factor;
        }
        self.last_age_update = now;
    }

    /// Fold a peer's predictabilities into ours
    ///
    /// For each `(c, p_bc)` advertised by `peer` with `c` other than us:
    /// `P_ac = P_ac_old + (1 - P_ac_old) * P_ab * p_bc * beta`.
    ///
    /// Returns the number of entries updated.
    pub fn propagate_transitive(
        &mut self,
        peer: &I,
        peer_snapshot: &PredictabilitySnapshot<I>,
        now: f64,
    ) -> usize {
        let p_ab = self.get_probability(peer, now);
        let beta = self.config.transitivity_constant;
        let mut updated = 0;

        for (destination, p_bc) in peer_snapshot.iter() {
            if destination == &self.local_id {
                continue;
            }

            let p_old = self.get_probability(destination, now);
            let p_new = p_old + (1.0 - p_old) * p_ab * p_bc * beta;
            self.probabilities.insert(destination.clone(), p_new);
            updated += 1;
        }

        trace!(
            node = %self.local_id,
            via = %peer,
            p_ab,
            updated,
            "Transitive predictability update"
        );
        updated
    }

    /// Age the table to `now` and return an owned copy of it
    pub fn snapshot(&mut self, now: f64) -> PredictabilitySnapshot<I> {
        self.age_all(now);
        PredictabilitySnapshot {
            owner: self.local_id.clone(),
            taken_at: now,
            probabilities: self.probabilities.clone(),
        }
    }

    /// A fresh, empty table for another node with the same configuration
    pub fn replicate(&self, local_id: I, now: f64) -> Self {
        Self::new(local_id, self.config.clone(), now)
    }
}

/// Aged copy of a node's predictability table
///
/// This is the only form in which one node's beliefs reach another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "I: NodeIdentity")]
pub struct PredictabilitySnapshot<I: NodeIdentity> {
    /// Node whose table this is
    pub owner: I,
    /// Simulated time the table was aged to
    pub taken_at: f64,
    /// Predictability per destination
    pub probabilities: HashMap<I, f64>,
}

impl<I: NodeIdentity> PredictabilitySnapshot<I> {
    /// Raw stored value for a destination
    pub fn get(&self, destination: &I) -> Option<f64> {
        self.probabilities.get(destination).copied()
    }

    /// Stored value for a destination, only if it lies within `[0, 1]`
    pub fn valid_probability(&self, destination: &I) -> Option<f64> {
        self.get(destination).filter(|p| (0.0..=1.0).contains(p))
    }

    /// Iterate over `(destination, probability)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&I, f64)> {
        self.probabilities.iter().map(|(id, p)| (id, *p))
    }

    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }
}

/// Read capability a predictability-aware node exposes to its peers
///
/// Taking a snapshot ages the provider's own table first, so a reader always
/// sees values decayed to the current simulated time.
pub trait PredictabilityProvider<I: NodeIdentity> {
    /// Identity of the node behind this provider
    fn node_id(&self) -> &I;

    /// Aged copy of the provider's table
    fn predictability_snapshot(&mut self, now: f64) -> PredictabilitySnapshot<I>;
}

impl<I: NodeIdentity> PredictabilityProvider<I> for PredictabilityTable<I> {
    fn node_id(&self) -> &I {
        &self.local_id
    }

    fn predictability_snapshot(&mut self, now: f64) -> PredictabilitySnapshot<I> {
        self.snapshot(now)
    }
}
