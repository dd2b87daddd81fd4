//! Tracing middleware: a child span around the rest of the stack.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::handler::{BoxedHandler, Handler};
use crate::middleware::Middleware;
use crate::request::Request;
use crate::trace::tag;

/// Pre+post unit: wraps the layers below it in a span of their own.
///
/// Before delegating it starts a child of the request's current span, named
/// `"{method} {path}"` and tagged with `http.method` and `http.url`, and
/// makes that child the request's active span. After the inner stack
/// returns it tags `http.status_code` from the response, logs one line
/// (method, path, status, latency), and finishes the child.
///
/// If the inner stack panics instead of returning, the child's drop guard
/// still finishes it, tagged `error`.
///
/// On a request with no tracer bound this unit is a pass-through; running
/// untraced is a configuration choice, not an error.
pub struct Trace;

impl Trace {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Trace {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for Trace {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        (move |mut req: Request| {
            let next = Arc::clone(&next);
            async move {
                let (Some(tracer), Some(parent)) = (req.tracer().cloned(), req.trace_context())
                else {
                    return next.call(req).await;
                };

                let mut span =
                    tracer.child_span(format!("{} {}", req.method(), req.path()), &parent);
                span.set_tag(tag::HTTP_METHOD, req.method().as_str());
                span.set_tag(tag::HTTP_URL, req.path());

                let method = req.method();
                let path = req.path().to_owned();
                let started = Instant::now();

                // The child is now the innermost span; layers below tag it,
                // not the parent.
                req.bind_trace(tracer, span.handle());
                let response = next.call(req).await;

                let status = response.status_code();
                span.set_tag(tag::HTTP_STATUS_CODE, status);
                info!(
                    method = %method,
                    path = %path,
                    status,
                    latency_ms = started.elapsed().as_millis() as u64,
                    "request served"
                );
                span.finish();
                response
            }
        })
        .into_boxed_handler()
    }
}
