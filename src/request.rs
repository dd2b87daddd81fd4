//! Incoming HTTP request type.
//!
//! Besides the parsed wire data, a `Request` carries the per-request tracing
//! state as a plain value: the [`Tracer`] that minted the root span and an
//! [`ActiveSpan`] handle onto whatever span is innermost at this point of the
//! chain. There is no ambient or thread-local context — if it is not on the
//! request, it does not exist.

use std::collections::HashMap;

use crate::method::Method;
use crate::trace::{ActiveSpan, TraceContext, Tracer};

/// The tracing state threaded through a request.
#[derive(Clone)]
pub(crate) struct TraceBinding {
    pub(crate) tracer: Tracer,
    pub(crate) span: ActiveSpan,
}

/// An incoming HTTP request.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Vec<u8>,
    pub(crate) params: HashMap<String, String>,
    pub(crate) request_id: Option<String>,
    pub(crate) trace: Option<TraceBinding>,
}

impl Request {
    /// Builds a request by hand.
    ///
    /// The server fills all of this in from the wire; hand-built requests are
    /// for exercising handlers, middleware, and dispatchers directly.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self::from_parts(method, path.into(), Vec::new(), Vec::new())
    }

    /// Adds a header. Chainable, for hand-built requests.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Sets the body. Chainable, for hand-built requests.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub(crate) fn from_parts(
        method: Method,
        path: String,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            method,
            path,
            headers,
            body,
            params: HashMap::new(),
            request_id: None,
            trace: None,
        }
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The correlation id set by the request-id middleware, if any.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Sets the correlation id for this request.
    pub fn set_request_id(&mut self, id: impl Into<String>) {
        self.request_id = Some(id.into());
    }

    /// The innermost span covering this request, if a tracer is attached.
    ///
    /// Handles can tag and rename but never finish; the layer that created
    /// the span owns its completion.
    pub fn span(&self) -> Option<&ActiveSpan> {
        self.trace.as_ref().map(|t| &t.span)
    }

    /// The tracer this request runs under, if any.
    pub fn tracer(&self) -> Option<&Tracer> {
        self.trace.as_ref().map(|t| &t.tracer)
    }

    /// The identity of the innermost span: what a child span or an outbound
    /// call should use as its parent.
    pub fn trace_context(&self) -> Option<TraceContext> {
        self.trace.as_ref().map(|t| t.span.context())
    }

    /// Attaches tracing state to the request.
    ///
    /// The dispatcher calls this with the root span; span-opening middleware
    /// calls it again to make its child the innermost span for the layers
    /// below.
    pub fn bind_trace(&mut self, tracer: Tracer, span: ActiveSpan) {
        self.trace = Some(TraceBinding { tracer, span });
    }
}
