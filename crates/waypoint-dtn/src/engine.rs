//! Collaborator interfaces
//!
//! The forwarding core decides *whether* and *what* to offer. Buffering,
//! eviction, byte transfer, and peer bookkeeping belong to the host. These
//! traits are the seams the host implements.

use std::fmt;

use serde::{Deserialize, Serialize};

use waypoint_core::NodeIdentity;

use crate::prophet::PredictabilityProvider;

/// Identifier of a buffered message
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The parts of a buffered message the router reads
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(bound = "I: NodeIdentity")]
pub struct Message<I: NodeIdentity> {
    /// Message identifier
    pub id: MessageId,
    /// Final destination
    pub destination: I,
    /// Size in bytes
    pub size: u64,
}

impl<I: NodeIdentity> Message<I> {
    pub fn new(id: impl Into<String>, destination: I, size: u64) -> Self {
        Self {
            id: MessageId::new(id),
            destination,
            size,
        }
    }
}

/// Base transfer engine of a node
///
/// Owns the message buffer and the connections. All transfer-starting
/// methods must respect a single active transfer per node and return the
/// message whose transfer started, if any.
pub trait TransferEngine<I: NodeIdentity> {
    /// Whether a transfer is in progress
    fn is_transferring(&self) -> bool;

    /// Whether a new transfer may start now
    fn can_start_transfer(&self) -> bool;

    /// Start delivering a message whose destination is a connected peer
    fn exchange_deliverable_messages(&mut self) -> Option<Message<I>>;

    /// Offer every buffered message to every connected peer
    fn try_all_messages_to_all_connections(&mut self) -> Option<Message<I>>;

    /// Offer the given messages to every connected peer
    fn try_messages_to_all_connections(&mut self, messages: &[Message<I>]) -> Option<Message<I>>;

    /// Free space in the node's buffer, in bytes
    fn free_buffer_size(&self) -> u64;

    /// Peers currently connected to this node
    fn connected_peers(&self) -> Vec<I>;

    /// Messages currently buffered for forwarding
    fn buffered_messages(&self) -> Vec<Message<I>>;
}

/// Access to the routers of other nodes
///
/// Returns `None` when the node behind `peer` does not run a
/// predictability-aware router.
pub trait PeerDirectory<I: NodeIdentity> {
    fn predictability_provider(&mut self, peer: &I) -> Option<&mut dyn PredictabilityProvider<I>>;
}
