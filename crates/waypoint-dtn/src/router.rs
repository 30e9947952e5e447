//! Energy-aware PRoPHET epidemic router
//!
//! [`ProphetEnergyRouter`] is the per-node driver. The host calls
//! [`ProphetEnergyRouter::update`] once per scheduler tick, after its own
//! transfer-engine housekeeping, and forwards contact changes through
//! [`ContactEventHandler`].
//!
//! ## Tick state machine
//!
//! ```text
//! Idle -> CheckBusy -> Busy
//!                   -> FinalDelivery -> Delivered
//!                                    -> AdmissionCheck -> Denied
//!                                                      -> Flood -> Flooded | Idle
//! ```
//!
//! Final-hop delivery is always attempted before the admission policy and
//! is never gated by it.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace};

use waypoint_core::NodeIdentity;

use crate::admission::{AdmissionDecision, TransferAdmissionPolicy};
use crate::config::RouterConfig;
use crate::contact::{ContactEventHandler, ContactOutcome, apply_connection_up, peer_snapshot};
use crate::energy::{EnergyModel, EnergyState};
use crate::engine::{Message, PeerDirectory, TransferEngine};
use crate::error::RouterResult;
use crate::observe::{RouterEvent, RouterObserver};
use crate::prophet::{PredictabilityProvider, PredictabilitySnapshot, PredictabilityTable};

/// How a tick ended
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TickOutcome<I: NodeIdentity> {
    /// A transfer is running or none may start
    Busy,
    /// A final-hop delivery started
    Delivered(Message<I>),
    /// No buffered message passed admission
    Denied { evaluated: usize },
    /// An admitted message started flooding
    Flooded(Message<I>),
    /// Nothing to do, or the engine started nothing
    Idle,
}

impl<I: NodeIdentity> TickOutcome<I> {
    /// Whether a transfer started during this tick
    pub fn started_transfer(&self) -> bool {
        matches!(self, TickOutcome::Delivered(_) | TickOutcome::Flooded(_))
    }
}

/// Per-node PRoPHET router with probability/energy/buffer admission
pub struct ProphetEnergyRouter<I: NodeIdentity> {
    /// Node configuration (owned copy)
    config: RouterConfig,
    /// Delivery predictability beliefs
    table: PredictabilityTable<I>,
    /// Forwarding gate
    policy: TransferAdmissionPolicy,
    /// Optional energy capability
    energy: Option<Box<dyn EnergyModel>>,
    /// Optional event sink
    observer: Option<Arc<dyn RouterObserver<I>>>,
}

impl<I: NodeIdentity> std::fmt::Debug for ProphetEnergyRouter<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProphetEnergyRouter")
            .field("node", self.table.local_id())
            .field("config", &self.config)
            .field("known_peers", &self.table.len())
            .field("energy", &self.energy)
            .finish()
    }
}

impl<I: NodeIdentity> ProphetEnergyRouter<I> {
    /// Create a router for `local_id` at simulated time `now`
    pub fn new(local_id: I, config: RouterConfig, now: f64) -> Self {
        let table = PredictabilityTable::new(local_id, config.prophet.clone(), now);
        let policy = TransferAdmissionPolicy::new(config.thresholds);
        Self {
            config,
            table,
            policy,
            energy: None,
            observer: None,
        }
    }

    /// Attach an energy model
    pub fn with_energy(mut self, energy: Box<dyn EnergyModel>) -> Self {
        self.energy = Some(energy);
        self
    }

    /// Attach an event observer
    pub fn with_observer(mut self, observer: Arc<dyn RouterObserver<I>>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get the local node's identity
    pub fn local_id(&self) -> &I {
        self.table.local_id()
    }

    /// Get the configuration
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Get the energy model, if any
    pub fn energy(&self) -> Option<&dyn EnergyModel> {
        self.energy.as_deref()
    }

    /// Mutable access to the energy model, for engines charging transfer costs
    pub fn energy_mut(&mut self) -> Option<&mut (dyn EnergyModel + 'static)> {
        self.energy.as_deref_mut()
    }

    /// Current energy as seen by the admission policy
    pub fn energy_state(&self) -> EnergyState {
        EnergyState::of(self.energy.as_deref())
    }

    /// Delivery predictability for `peer`, aged to `now`
    pub fn predictability(&mut self, peer: &I, now: f64) -> f64 {
        self.table.get_probability(peer, now)
    }

    /// Number of nodes this router holds a belief about
    pub fn known_peers(&self) -> usize {
        self.table.len()
    }

    /// Read-only access to the predictability table
    pub fn table(&self) -> &PredictabilityTable<I> {
        &self.table
    }

    /// Age the table to `now`
    pub fn age(&mut self, now: f64) {
        self.table.age_all(now);
    }

    /// A fresh router for another node with the same configuration
    ///
    /// The replica starts with an empty predictability table and, if this
    /// router has an energy model, a fully charged model of the same kind.
    pub fn replicate(&self, local_id: I, now: f64) -> Self {
        Self {
            config: self.config.clone(),
            table: self.table.replicate(local_id, now),
            policy: self.policy.clone(),
            energy: self.energy.as_ref().map(|e| e.replicate()),
            observer: self.observer.clone(),
        }
    }

    /// Run one scheduler tick
    pub fn update(
        &mut self,
        engine: &mut dyn TransferEngine<I>,
        peers: &mut dyn PeerDirectory<I>,
        now: f64,
    ) -> RouterResult<TickOutcome<I>> {
        if engine.is_transferring() || !engine.can_start_transfer() {
            return Ok(TickOutcome::Busy);
        }

        if let Some(message) = engine.exchange_deliverable_messages() {
            debug!(node = %self.local_id(), message = %message.id, "Final-hop delivery started");
            self.emit(RouterEvent::DirectDelivery {
                node: self.local_id().clone(),
                message: message.id.clone(),
            });
            return Ok(TickOutcome::Delivered(message));
        }

        let buffered = engine.buffered_messages();
        if buffered.is_empty() {
            return Ok(TickOutcome::Idle);
        }

        let connected = self.connected_snapshots(engine, peers, now)?;
        let admitted = self.admit(&buffered, &connected, engine.free_buffer_size());
        if admitted.is_empty() {
            return Ok(TickOutcome::Denied {
                evaluated: buffered.len(),
            });
        }

        let started = if admitted.len() == buffered.len() {
            engine.try_all_messages_to_all_connections()
        } else {
            engine.try_messages_to_all_connections(&admitted)
        };

        match started {
            Some(message) => {
                debug!(
                    node = %self.local_id(),
                    message = %message.id,
                    admitted = admitted.len(),
                    "Epidemic forward started"
                );
                self.emit(RouterEvent::FloodStarted {
                    node: self.local_id().clone(),
                    message: message.id.clone(),
                    admitted: admitted.len(),
                });
                Ok(TickOutcome::Flooded(message))
            }
            None => Ok(TickOutcome::Idle),
        }
    }

    /// Aged snapshots of every connected peer
    fn connected_snapshots(
        &self,
        engine: &dyn TransferEngine<I>,
        peers: &mut dyn PeerDirectory<I>,
        now: f64,
    ) -> RouterResult<Vec<PredictabilitySnapshot<I>>> {
        engine
            .connected_peers()
            .iter()
            .map(|peer| peer_snapshot(peers, peer, now))
            .collect()
    }

    /// Evaluate every buffered message and keep the admitted ones
    fn admit(
        &self,
        buffered: &[Message<I>],
        connected: &[PredictabilitySnapshot<I>],
        free_buffer: u64,
    ) -> Vec<Message<I>> {
        let energy = self.energy_state();
        let mut admitted = Vec::new();

        for message in buffered {
            let probability = self
                .policy
                .probability_to_destination(&message.destination, connected);
            let decision = self
                .policy
                .evaluate(message, probability, energy, free_buffer);

            self.report_admission(message, &decision);
            if decision.is_admitted() {
                admitted.push(message.clone());
            }
        }

        admitted
    }

    fn report_admission(&self, message: &Message<I>, decision: &AdmissionDecision) {
        let inputs = decision.inputs();
        let reasons: Vec<&str> = decision.reasons().iter().map(|r| r.as_str()).collect();
        debug!(
            node = %self.local_id(),
            message = %message.id,
            destination = %message.destination,
            admitted = decision.is_admitted(),
            ?reasons,
            probability = inputs.probability_to_destination,
            has_energy = inputs.energy.has_energy,
            energy = inputs.energy.current,
            size = inputs.message_size,
            free_buffer = inputs.free_buffer,
            "Admission decision"
        );
        self.emit(RouterEvent::Admission {
            node: self.local_id().clone(),
            message: message.id.clone(),
            decision: decision.clone(),
        });
    }

    fn emit(&self, event: RouterEvent<I>) {
        if let Some(observer) = &self.observer {
            observer.on_event(&event);
        }
    }
}

impl<I: NodeIdentity> ContactEventHandler<I> for ProphetEnergyRouter<I> {
    fn on_connection_up(
        &mut self,
        peer: &I,
        is_initiator: bool,
        peers: &mut dyn PeerDirectory<I>,
        now: f64,
    ) -> RouterResult<ContactOutcome> {
        let outcome = apply_connection_up(
            &mut self.table,
            self.energy.as_deref_mut(),
            peer,
            is_initiator,
            peers,
            now,
        )?;

        self.emit(RouterEvent::ContactUp {
            node: self.local_id().clone(),
            peer: peer.clone(),
            initiator: is_initiator,
            discovery_charged: outcome.discovery_charged,
            predictability: outcome.predictability,
            transitive_updates: outcome.transitive_updates,
        });
        Ok(outcome)
    }

    fn on_connection_down(&mut self, peer: &I, _now: f64) {
        trace!(node = %self.local_id(), peer = %peer, "Contact down");
        self.emit(RouterEvent::ContactDown {
            node: self.local_id().clone(),
            peer: peer.clone(),
        });
    }
}

impl<I: NodeIdentity> PredictabilityProvider<I> for ProphetEnergyRouter<I> {
    fn node_id(&self) -> &I {
        self.table.local_id()
    }

    fn predictability_snapshot(&mut self, now: f64) -> PredictabilitySnapshot<I> {
        self.table.snapshot(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use waypoint_core::SimulationIdentity;

    use crate::admission::DenyReason;
    use crate::energy::{BatteryModel, EnergyConfig};
    use crate::observe::RecordingObserver;

    type Id = SimulationIdentity;

    fn make_id(c: char) -> Id {
        SimulationIdentity::new(c).unwrap()
    }

    fn config(threshold_energy: f64, threshold_probability: f64) -> RouterConfig {
        RouterConfig::new(30.0, threshold_energy, threshold_probability).unwrap()
    }

    fn battery(energy: f64) -> Box<dyn EnergyModel> {
        Box::new(BatteryModel::new(EnergyConfig {
            initial_energy: energy,
            discovery_cost: 1.0,
        }))
    }

    /// Scripted transfer engine
    #[derive(Default)]
    struct TestEngine {
        transferring: bool,
        blocked: bool,
        deliverable: Option<Message<Id>>,
        buffer: Vec<Message<Id>>,
        free_buffer: u64,
        connected: Vec<Id>,
        offered: Vec<Vec<Message<Id>>>,
        tried_all: usize,
    }

    impl TransferEngine<Id> for TestEngine {
        fn is_transferring(&self) -> bool {
            self.transferring
        }

        fn can_start_transfer(&self) -> bool {
            !self.blocked
        }

        fn exchange_deliverable_messages(&mut self) -> Option<Message<Id>> {
            self.deliverable.take()
        }

        fn try_all_messages_to_all_connections(&mut self) -> Option<Message<Id>> {
            self.tried_all += 1;
            let all = self.buffer.clone();
            self.try_messages_to_all_connections(&all)
        }

        fn try_messages_to_all_connections(&mut self, messages: &[Message<Id>]) -> Option<Message<Id>> {
            self.offered.push(messages.to_vec());
            if self.connected.is_empty() {
                return None;
            }
            self.transferring = true;
            messages.first().cloned()
        }

        fn free_buffer_size(&self) -> u64 {
            self.free_buffer
        }

        fn connected_peers(&self) -> Vec<Id> {
            self.connected.clone()
        }

        fn buffered_messages(&self) -> Vec<Message<Id>> {
            self.buffer.clone()
        }
    }

    struct Peers(HashMap<Id, ProphetEnergyRouter<Id>>);

    impl PeerDirectory<Id> for Peers {
        fn predictability_provider(
            &mut self,
            peer: &Id,
        ) -> Option<&mut dyn PredictabilityProvider<Id>> {
            self.0
                .get_mut(peer)
                .map(|r| r as &mut dyn PredictabilityProvider<Id>)
        }
    }

    /// Peer 'B' that believes it reaches 'Z' with 0.75
    fn peer_b_knowing_z() -> Peers {
        let mut b = ProphetEnergyRouter::new(make_id('B'), config(0.0, 0.0), 0.0);
        let mut z_dir = Peers(HashMap::from([(
            make_id('Z'),
            ProphetEnergyRouter::new(make_id('Z'), config(0.0, 0.0), 0.0),
        )]));
        b.on_connection_up(&make_id('Z'), true, &mut z_dir, 0.0).unwrap();
        Peers(HashMap::from([(make_id('B'), b)]))
    }

    fn engine_with(messages: Vec<Message<Id>>, connected: Vec<Id>) -> TestEngine {
        TestEngine {
            buffer: messages,
            free_buffer: 10_000,
            connected,
            ..Default::default()
        }
    }

    #[test]
    fn test_busy_engine_stops_tick() {
        let mut router =
            ProphetEnergyRouter::new(make_id('A'), config(0.0, 0.0), 0.0).with_energy(battery(10.0));
        let mut engine = engine_with(vec![Message::new("M1", make_id('Z'), 10)], vec![make_id('B')]);
        engine.transferring = true;
        let mut peers = peer_b_knowing_z();

        let outcome = router.update(&mut engine, &mut peers, 0.0).unwrap();
        assert_eq!(outcome, TickOutcome::Busy);
        assert!(engine.offered.is_empty());

        engine.transferring = false;
        engine.blocked = true;
        let outcome = router.update(&mut engine, &mut peers, 0.0).unwrap();
        assert_eq!(outcome, TickOutcome::Busy);
    }

    #[test]
    fn test_final_delivery_bypasses_admission() {
        let observer = Arc::new(RecordingObserver::new());
        // No energy model: admission would deny everything
        let mut router = ProphetEnergyRouter::new(make_id('A'), config(100.0, 1.0), 0.0)
            .with_observer(observer.clone());
        let delivery = Message::new("M1", make_id('B'), 10);
        let mut engine = engine_with(vec![delivery.clone()], vec![make_id('B')]);
        engine.deliverable = Some(delivery.clone());
        let mut peers = peer_b_knowing_z();

        let outcome = router.update(&mut engine, &mut peers, 0.0).unwrap();
        assert_eq!(outcome, TickOutcome::Delivered(delivery));
        assert!(observer.admissions().is_empty());
    }

    #[test]
    fn test_admitted_message_floods() {
        let observer = Arc::new(RecordingObserver::new());
        let mut router = ProphetEnergyRouter::new(make_id('A'), config(5.0, 0.5), 0.0)
            .with_energy(battery(10.0))
            .with_observer(observer.clone());
        let message = Message::new("M1", make_id('Z'), 10);
        let mut engine = engine_with(vec![message.clone()], vec![make_id('B')]);
        let mut peers = peer_b_knowing_z();

        let outcome = router.update(&mut engine, &mut peers, 0.0).unwrap();
        assert_eq!(outcome, TickOutcome::Flooded(message));
        assert_eq!(engine.tried_all, 1);

        let admissions = observer.admissions();
        assert_eq!(admissions.len(), 1);
        assert_eq!(admissions[0].inputs().probability_to_destination, 0.75);
    }

    #[test]
    fn test_only_admitted_messages_are_offered() {
        let mut router = ProphetEnergyRouter::new(make_id('A'), config(5.0, 0.5), 0.0)
            .with_energy(battery(10.0));
        let to_z = Message::new("M1", make_id('Z'), 10);
        let to_y = Message::new("M2", make_id('Y'), 10);
        let mut engine = engine_with(vec![to_y, to_z.clone()], vec![make_id('B')]);
        let mut peers = peer_b_knowing_z();

        let outcome = router.update(&mut engine, &mut peers, 0.0).unwrap();
        assert_eq!(outcome, TickOutcome::Flooded(to_z.clone()));
        assert_eq!(engine.tried_all, 0);
        assert_eq!(engine.offered, vec![vec![to_z]]);
    }

    #[test]
    fn test_denied_when_probability_low() {
        let observer = Arc::new(RecordingObserver::new());
        let mut router = ProphetEnergyRouter::new(make_id('A'), config(5.0, 0.8), 0.0)
            .with_energy(battery(10.0))
            .with_observer(observer.clone());
        let mut engine = engine_with(vec![Message::new("M1", make_id('Z'), 10)], vec![make_id('B')]);
        let mut peers = peer_b_knowing_z();

        let outcome = router.update(&mut engine, &mut peers, 0.0).unwrap();
        assert_eq!(outcome, TickOutcome::Denied { evaluated: 1 });
        assert!(engine.offered.is_empty());
        assert_eq!(
            observer.admissions()[0].reasons(),
            vec![DenyReason::ProbabilityBelowThreshold]
        );
    }

    #[test]
    fn test_no_energy_model_never_floods() {
        let mut router = ProphetEnergyRouter::new(make_id('A'), config(0.0, 0.0), 0.0);
        let mut engine = engine_with(vec![Message::new("M1", make_id('Z'), 10)], vec![make_id('B')]);
        let mut peers = peer_b_knowing_z();

        let outcome = router.update(&mut engine, &mut peers, 0.0).unwrap();
        assert_eq!(outcome, TickOutcome::Denied { evaluated: 1 });
    }

    #[test]
    fn test_empty_buffer_is_idle() {
        let mut router = ProphetEnergyRouter::new(make_id('A'), config(0.0, 0.0), 0.0)
            .with_energy(battery(10.0));
        let mut engine = engine_with(vec![], vec![make_id('B')]);
        let mut peers = peer_b_knowing_z();

        assert_eq!(
            router.update(&mut engine, &mut peers, 0.0).unwrap(),
            TickOutcome::Idle
        );
    }

    #[test]
    fn test_incompatible_connected_peer_is_fatal() {
        let mut router = ProphetEnergyRouter::new(make_id('A'), config(0.0, 0.0), 0.0)
            .with_energy(battery(10.0));
        let mut engine = engine_with(vec![Message::new("M1", make_id('Z'), 10)], vec![make_id('Q')]);
        let mut peers = Peers(HashMap::new());

        let err = router.update(&mut engine, &mut peers, 0.0).unwrap_err();
        assert!(matches!(err, crate::RouterError::IncompatiblePeer { .. }));
    }

    #[test]
    fn test_contact_events_are_observed() {
        let observer = Arc::new(RecordingObserver::new());
        let mut router = ProphetEnergyRouter::new(make_id('A'), config(0.0, 0.0), 0.0)
            .with_energy(battery(10.0))
            .with_observer(observer.clone());
        let mut peers = peer_b_knowing_z();

        router
            .handle_contact(&crate::Contact::up(make_id('B'), false), &mut peers, 0.0)
            .unwrap();
        router
            .handle_contact(&crate::Contact::down(make_id('B')), &mut peers, 10.0)
            .unwrap();

        let events = observer.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            RouterEvent::ContactUp {
                discovery_charged: true,
                transitive_updates: 1,
                ..
            }
        ));
        assert!(matches!(events[1], RouterEvent::ContactDown { .. }));
        assert_eq!(router.energy().map(|e| e.current()), Some(9.0));
    }

    #[test]
    fn test_beliefs_survive_disconnect() {
        let mut router = ProphetEnergyRouter::new(make_id('A'), config(0.0, 0.0), 0.0);
        let mut peers = peer_b_knowing_z();

        router.on_connection_up(&make_id('B'), true, &mut peers, 0.0).unwrap();
        router.on_connection_down(&make_id('B'), 0.0);
        assert_eq!(router.predictability(&make_id('B'), 0.0), 0.75);
    }

    #[test]
    fn test_replicate() {
        let config = RouterConfig::from_settings(&crate::RouterSettings {
            seconds_per_time_unit: Some(45.0),
            beta: Some(0.4),
            threshold_energy: Some(3.0),
            threshold_probability: Some(0.2),
            ..Default::default()
        })
        .unwrap();
        let mut router =
            ProphetEnergyRouter::new(make_id('A'), config, 0.0).with_energy(battery(10.0));
        let mut peers = peer_b_knowing_z();
        router.on_connection_up(&make_id('B'), false, &mut peers, 0.0).unwrap();
        assert!(router.known_peers() > 0);

        let replica = router.replicate(make_id('C'), 5.0);
        assert_eq!(replica.config(), router.config());
        assert_eq!(replica.config().beta(), 0.4);
        assert_eq!(replica.config().seconds_per_time_unit(), 45.0);
        assert_eq!(replica.known_peers(), 0);
        assert_eq!(replica.local_id(), &make_id('C'));
        assert_eq!(replica.energy().map(|e| e.current()), Some(10.0));
    }
}
