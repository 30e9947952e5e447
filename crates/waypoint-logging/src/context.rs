//! Node context for multi-node simulations
//!
//! Many routers share one process and one thread in a simulation run. The
//! scheduler sets the node whose turn it is with a [`NodeContextGuard`], and
//! every span opened in that scope is tagged with the node's id.

use std::cell::RefCell;

use uuid::Uuid;
use waypoint_core::NodeIdentity;

/// Node context stored in thread-local storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeContextData {
    /// The node's short id
    pub node_id: String,
    /// Unique id of this node instance within the run
    pub instance_id: Uuid,
}

thread_local! {
    static NODE_CONTEXT: RefCell<Option<NodeContextData>> = const { RefCell::new(None) };
}

/// RAII guard for node context
///
/// Sets the node context for the current thread and restores the previous
/// one on drop, so guards nest.
///
/// # Example
///
/// ```ignore
/// use waypoint_core::SimulationIdentity;
/// use waypoint_logging::NodeContextGuard;
///
/// let node = SimulationIdentity::new('A').unwrap();
/// let _guard = NodeContextGuard::new(&node);
///
/// // Spans opened here carry node_id = "A"
/// let span = tracing::debug_span!("tick");
/// ```
pub struct NodeContextGuard {
    previous: Option<NodeContextData>,
}

impl NodeContextGuard {
    /// Set the context for `identity` with a fresh instance id
    pub fn new<I: NodeIdentity>(identity: &I) -> Self {
        Self::with_instance_id(identity, Uuid::new_v4())
    }

    /// Set the context with a known instance id
    pub fn with_instance_id<I: NodeIdentity>(identity: &I, instance_id: Uuid) -> Self {
        let data = NodeContextData {
            node_id: identity.short_id(),
            instance_id,
        };
        let previous = NODE_CONTEXT.with(|ctx| ctx.borrow_mut().replace(data));
        Self { previous }
    }

    pub fn current() -> Option<NodeContextData> {
        NODE_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    pub fn current_node_id() -> Option<String> {
        Self::current().map(|ctx| ctx.node_id)
    }

    pub fn current_instance_id() -> Option<Uuid> {
        Self::current().map(|ctx| ctx.instance_id)
    }
}

impl Drop for NodeContextGuard {
    fn drop(&mut self) {
        NODE_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

/// Run a block with a node context set
///
/// ```ignore
/// with_node_context!(&node, {
///     router.update(&mut engine, &mut peers, now)?;
/// });
/// ```
#[macro_export]
macro_rules! with_node_context {
    ($identity:expr, $body:block) => {{
        let _guard = $crate::context::NodeContextGuard::new($identity);
        $body
    }};
}
