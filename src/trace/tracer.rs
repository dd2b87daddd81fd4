//! Tracer configuration and span minting.

use std::sync::Arc;

use crate::error::Error;
use super::collector::{Collector, HttpCollector};
use super::context::{SpanId, TraceContext, TraceId};
use super::span::Span;

/// Where the stock HTTP collector posts spans unless told otherwise.
pub const DEFAULT_COLLECTOR_ENDPOINT: &str = "http://localhost:9411/api/v2/spans";

// ── TracerConfig ──────────────────────────────────────────────────────────────

/// Tracer configuration. Immutable once the tracer is built.
///
/// ```rust,no_run
/// use filament::trace::TracerConfig;
///
/// let config = TracerConfig::new("user-service")
///     .with_endpoint("http://zipkin.internal:9411/api/v2/spans")
///     .with_debug(true);
/// ```
#[derive(Clone, Debug)]
pub struct TracerConfig {
    /// Recorded on every exported span as the local endpoint.
    pub service_name: String,
    /// Where [`Tracer::new`] sends spans.
    pub collector_endpoint: String,
    /// Log every span start and finish at debug level.
    pub debug: bool,
    /// Joined server spans reuse the caller's span id (exported as shared)
    /// instead of becoming ordinary children.
    pub same_span_rpc: bool,
    /// Mint 128-bit trace ids for new traces.
    pub use_128bit_trace_id: bool,
}

impl TracerConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            collector_endpoint: DEFAULT_COLLECTOR_ENDPOINT.to_owned(),
            debug: false,
            same_span_rpc: true,
            use_128bit_trace_id: true,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.collector_endpoint = endpoint.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_same_span_rpc(mut self, same_span: bool) -> Self {
        self.same_span_rpc = same_span;
        self
    }

    pub fn with_128bit_trace_ids(mut self, wide: bool) -> Self {
        self.use_128bit_trace_id = wide;
        self
    }
}

// ── Tracer ────────────────────────────────────────────────────────────────────

struct TracerInner {
    config: TracerConfig,
    collector: Arc<dyn Collector>,
}

/// Mints spans and routes them to a collector.
///
/// A `Tracer` is an explicit value: construct one at startup, clone it into
/// whatever needs to trace (clones share the collector), and let everything
/// without one stay untraced. Nothing in this crate registers a tracer
/// globally.
#[derive(Clone)]
pub struct Tracer {
    inner: Arc<TracerInner>,
}

impl Tracer {
    /// A tracer exporting over HTTP per `config`.
    ///
    /// Spawns the export task, so it must be called from within a tokio
    /// runtime. Fails rather than degrades: a tracer you hold is a tracer
    /// that works.
    pub fn new(config: TracerConfig) -> Result<Self, Error> {
        if config.service_name.is_empty() {
            return Err(Error::Setup("tracer service name is empty".to_owned()));
        }
        let collector = HttpCollector::spawn(config.collector_endpoint.clone())?;
        Ok(Self::with_collector(config, collector))
    }

    /// A tracer delivering to a caller-supplied collector.
    ///
    /// Tests pair this with [`MemoryCollector`](super::MemoryCollector).
    pub fn with_collector(config: TracerConfig, collector: impl Collector) -> Self {
        Self {
            inner: Arc::new(TracerInner { config, collector: Arc::new(collector) }),
        }
    }

    pub fn config(&self) -> &TracerConfig {
        &self.inner.config
    }

    /// Starts a new root span, beginning a fresh trace.
    pub fn span(&self, name: impl Into<String>) -> Span {
        let context = TraceContext {
            trace_id: TraceId::random(self.inner.config.use_128bit_trace_id),
            span_id: SpanId::random(),
            parent_id: None,
        };
        self.start(name.into(), context, false)
    }

    /// Starts a child of `parent` within the same trace.
    pub fn child_span(&self, name: impl Into<String>, parent: &TraceContext) -> Span {
        let context = TraceContext {
            trace_id: parent.trace_id,
            span_id: SpanId::random(),
            parent_id: Some(parent.span_id),
        };
        self.start(name.into(), context, false)
    }

    /// Continues a trace arriving from the wire: the server side of an RPC.
    ///
    /// With `same_span_rpc` the server span reuses the caller's span id and
    /// is exported as shared; otherwise it becomes an ordinary child.
    pub fn join_span(&self, name: impl Into<String>, inbound: &TraceContext) -> Span {
        if self.inner.config.same_span_rpc {
            self.start(name.into(), *inbound, true)
        } else {
            self.child_span(name, inbound)
        }
    }

    /// Flushes the collector and stops its background work.
    ///
    /// Call once at process shutdown, after the server has drained.
    pub async fn shutdown(&self) {
        self.inner.collector.shutdown().await;
    }

    fn start(&self, name: String, context: TraceContext, shared: bool) -> Span {
        Span::start(
            name,
            context,
            shared,
            self.inner.config.service_name.clone(),
            self.inner.config.debug,
            Arc::clone(&self.inner.collector),
        )
    }
}
