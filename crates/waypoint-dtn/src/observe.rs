//! Router observability events
//!
//! Routers report what they decided through a [`RouterObserver`] instead of
//! printing. Every event is also emitted through `tracing` by the router, so
//! an observer is only needed when a host wants the events as values
//! (reports, assertions in tests).

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use waypoint_core::NodeIdentity;

use crate::admission::AdmissionDecision;
use crate::engine::MessageId;

/// Something a router did or decided
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RouterEvent<I: NodeIdentity> {
    /// A contact came up and predictability was updated
    ContactUp {
        node: I,
        peer: I,
        initiator: bool,
        discovery_charged: bool,
        predictability: f64,
        transitive_updates: usize,
    },
    /// A contact went down
    ContactDown { node: I, peer: I },
    /// A candidate message was evaluated for forwarding
    Admission {
        node: I,
        message: MessageId,
        decision: AdmissionDecision,
    },
    /// A final-hop delivery started
    DirectDelivery { node: I, message: MessageId },
    /// An epidemic forward started
    FloodStarted {
        node: I,
        message: MessageId,
        admitted: usize,
    },
}

/// Sink for router events
pub trait RouterObserver<I: NodeIdentity>: Send + Sync {
    fn on_event(&self, event: &RouterEvent<I>);
}

/// Observer that keeps every event in memory
#[derive(Debug)]
pub struct RecordingObserver<I: NodeIdentity> {
    events: Mutex<Vec<RouterEvent<I>>>,
}

impl<I: NodeIdentity> RecordingObserver<I> {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Copy of all recorded events, oldest first
    pub fn events(&self) -> Vec<RouterEvent<I>> {
        self.lock().clone()
    }

    /// Admission decisions only
    pub fn admissions(&self) -> Vec<AdmissionDecision> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RouterEvent::Admission { decision, .. } => Some(decision),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// A panic in another observer call must not lose the history
    fn lock(&self) -> MutexGuard<'_, Vec<RouterEvent<I>>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<I: NodeIdentity> Default for RecordingObserver<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: NodeIdentity> RouterObserver<I> for RecordingObserver<I> {
    fn on_event(&self, event: &RouterEvent<I>) {
        self.lock().push(event.clone());
    }
}
