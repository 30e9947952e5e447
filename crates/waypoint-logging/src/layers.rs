//! Custom tracing layers for Waypoint
//!
//! [`NodeContextLayer`] attaches the active node context to every new span,
//! and [`jsonl_layer`] builds the JSONL formatter shared by console and file
//! output.

use tracing::{Subscriber, span};
use tracing_subscriber::{
    Layer,
    fmt::MakeWriter,
    layer::Context,
    registry::{LookupSpan, SpanRef},
};

use crate::config::JsonlConfig;
use crate::context::{NodeContextData, NodeContextGuard};

/// Layer that tags spans with the current node context
///
/// Spans opened while a [`NodeContextGuard`] is alive carry a
/// [`NodeContextExtension`]; events inherit it from their parent span.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeContextLayer;

impl NodeContextLayer {
    pub fn new() -> Self {
        Self
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeContextExtension {
    pub data: NodeContextData,
}

impl NodeContextExtension {
    /// Node context recorded on `span` or its nearest ancestor
    pub fn of<'a, R: LookupSpan<'a>>(span: &SpanRef<'a, R>) -> Option<NodeContextData> {
        span.scope()
            .find_map(|s| s.extensions().get::<NodeContextExtension>().map(|e| e.data.clone()))
    }
}

impl<S> Layer<S> for NodeContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if let (Some(span), Some(data)) = (ctx.span(id), NodeContextGuard::current()) {
            span.extensions_mut().insert(NodeContextExtension { data });
        }
    }
}

/// JSONL formatting layer writing to `writer`
pub fn jsonl_layer<S, W>(writer: W, config: &JsonlConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup> + 'static,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(config.include_spans)
        .flatten_event(config.flatten_events)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_thread_ids(config.include_thread_info)
        .with_thread_names(config.include_thread_info)
        .with_writer(writer)
        .boxed()
}
