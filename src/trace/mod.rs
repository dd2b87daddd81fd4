//! Distributed tracing: identities, spans, the tracer, and span export.
//!
//! The model is deliberately small:
//!
//! - [`Tracer`] is an explicit value you construct once and pass around.
//!   There is no global registry and no thread-local — a component that
//!   traces holds a `Tracer`, a component that doesn't, doesn't.
//! - [`Span`] is an owned guard. Whoever starts a span finishes it, either
//!   with [`Span::finish`] or implicitly on drop. A span cannot leak.
//! - [`ActiveSpan`] is the cloneable handle inner layers get for tagging.
//!   Handles cannot finish a span, so acquire and release stay symmetric.
//! - [`Collector`] receives every [`FinishedSpan`]; the stock
//!   [`HttpCollector`] batches them to an HTTP endpoint from a background
//!   task, and [`MemoryCollector`] keeps them in memory for tests.

pub mod collector;
mod context;
mod span;
mod tracer;

pub use collector::{Collector, FlushFuture, HttpCollector, MemoryCollector};
pub use context::{SpanId, TraceContext, TraceId};
pub use span::{ActiveSpan, Endpoint, FinishedSpan, Span, TagValue};
pub use tracer::{Tracer, TracerConfig, DEFAULT_COLLECTOR_ENDPOINT};

/// Conventional tag keys.
///
/// The `http.*`, `peer.*`, and `span.kind` keys follow the OpenTracing
/// semantic conventions so exported spans line up with what tracing UIs
/// expect. `request_id` and `cancelled` are this crate's own.
pub mod tag {
    /// HTTP method of the traced operation, e.g. `GET`.
    pub const HTTP_METHOD: &str = "http.method";
    /// URL (outbound calls) or path (served requests) of the traced operation.
    pub const HTTP_URL: &str = "http.url";
    /// Numeric HTTP status code of the completed operation.
    pub const HTTP_STATUS_CODE: &str = "http.status_code";
    /// Remote service name for client spans.
    pub const PEER_SERVICE: &str = "peer.service";
    /// `client` or `server`.
    pub const SPAN_KIND: &str = "span.kind";
    /// Set to `true` when a span closed during a panic unwind.
    pub const ERROR: &str = "error";
    /// Set to `true` when a span was dropped without an explicit finish,
    /// usually because the future driving it was cancelled.
    pub const CANCELLED: &str = "cancelled";
    /// Correlation id attached by the request-id middleware.
    pub const REQUEST_ID: &str = "request_id";
}
