//! Contact event handling
//!
//! When a peer becomes reachable a node:
//!
//! 1. pays the discovery energy cost, unless it initiated the contact
//! 2. records the direct encounter in its predictability table
//! 3. folds the peer's aged predictabilities into its own (transitivity)
//!
//! Losing a contact changes nothing: beliefs only decay through aging.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use waypoint_core::NodeIdentity;

use crate::energy::EnergyModel;
use crate::engine::PeerDirectory;
use crate::error::{RouterError, RouterResult};
use crate::prophet::{PredictabilitySnapshot, PredictabilityTable};

/// A change in reachability of one peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "I: NodeIdentity")]
pub struct Contact<I: NodeIdentity> {
    /// The other side of the contact
    pub peer: I,
    /// Whether this node discovered the peer
    pub is_initiator: bool,
    /// Whether the contact came up or went down
    pub up: bool,
}

impl<I: NodeIdentity> Contact<I> {
    pub fn up(peer: I, is_initiator: bool) -> Self {
        Self {
            peer,
            is_initiator,
            up: true,
        }
    }

    pub fn down(peer: I) -> Self {
        Self {
            peer,
            is_initiator: false,
            up: false,
        }
    }
}

/// What a contact-up changed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactOutcome {
    /// Discovery energy was charged to this node
    pub discovery_charged: bool,
    /// Predictability for the peer after the direct update
    pub predictability: f64,
    /// Number of entries touched by the transitive update
    pub transitive_updates: usize,
}

/// Reaction of a node to contacts coming up and going down
pub trait ContactEventHandler<I: NodeIdentity> {
    /// A peer became reachable
    fn on_connection_up(
        &mut self,
        peer: &I,
        is_initiator: bool,
        peers: &mut dyn PeerDirectory<I>,
        now: f64,
    ) -> RouterResult<ContactOutcome>;

    /// A peer is no longer reachable
    fn on_connection_down(&mut self, peer: &I, now: f64);

    /// Dispatch a contact event
    fn handle_contact(
        &mut self,
        contact: &Contact<I>,
        peers: &mut dyn PeerDirectory<I>,
        now: f64,
    ) -> RouterResult<Option<ContactOutcome>> {
        if contact.up {
            self.on_connection_up(&contact.peer, contact.is_initiator, peers, now)
                .map(Some)
        } else {
            self.on_connection_down(&contact.peer, now);
            Ok(None)
        }
    }
}

/// Aged snapshot of a connected peer's table
///
/// Fails when the peer does not expose delivery predictability.
pub fn peer_snapshot<I: NodeIdentity>(
    peers: &mut dyn PeerDirectory<I>,
    peer: &I,
    now: f64,
) -> RouterResult<PredictabilitySnapshot<I>> {
    match peers.predictability_provider(peer) {
        Some(provider) => Ok(provider.predictability_snapshot(now)),
        None => {
            warn!(peer = %peer, "Connected peer is not predictability-aware");
            Err(RouterError::IncompatiblePeer {
                peer: peer.short_id(),
            })
        }
    }
}

/// Apply a contact-up to a node's table and energy
///
/// The peer's snapshot is resolved before anything is mutated, so an
/// incompatible peer leaves the node untouched.
pub fn apply_connection_up<I: NodeIdentity>(
    table: &mut PredictabilityTable<I>,
    energy: Option<&mut (dyn EnergyModel + '_)>,
    peer: &I,
    is_initiator: bool,
    peers: &mut dyn PeerDirectory<I>,
    now: f64,
) -> RouterResult<ContactOutcome> {
    let snapshot = peer_snapshot(peers, peer, now)?;

    let discovery_charged = match energy {
        Some(model) if !is_initiator => {
            model.charge_discovery_cost();
            true
        }
        _ => false,
    };

    let predictability = table.record_direct_contact(peer, now);
    let transitive_updates = table.propagate_transitive(peer, &snapshot, now);

    debug!(
        node = %table.local_id(),
        peer = %peer,
        initiator = is_initiator,
        charged = discovery_charged,
        predictability,
        transitive_updates,
        "Contact up"
    );

    Ok(ContactOutcome {
        discovery_charged,
        predictability,
        transitive_updates,
    })
}
