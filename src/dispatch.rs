//! Request dispatch: one root span per request, owned here.
//!
//! The dispatcher sits between the server glue and the router. Its whole job
//! is the trace lifecycle the rest of the crate relies on:
//!
//! - exactly one root span per request, minted fresh or joined from inbound
//!   B3 headers when the caller is already tracing,
//! - the tracer and root handle bound onto the request before any handler
//!   or middleware runs, so every layer below finds its context as a value,
//! - the root finished on every exit path. The clean path tags the response
//!   status and finishes explicitly; a panicking handler unwinds through
//!   the guard, which finishes the root tagged `error`.
//!
//! Unrouted requests are not special: the 404 runs under the root span like
//! any other response.

use crate::request::Request;
use crate::response::Response;
use crate::router::Router;
use crate::status::Status;
use crate::trace::{tag, TraceContext, Tracer};

/// Routes requests and owns the root span of each one.
pub struct Dispatcher {
    router: Router,
    tracer: Option<Tracer>,
}

impl Dispatcher {
    /// A dispatcher that serves `router` untraced.
    pub fn new(router: Router) -> Self {
        Self { router, tracer: None }
    }

    /// Attaches a tracer; every request then runs under a root span.
    pub fn with_tracer(mut self, tracer: Tracer) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Handles one request end to end.
    pub async fn handle(&self, mut req: Request) -> Response {
        let Some(tracer) = &self.tracer else {
            return self.route(req).await;
        };

        let name = format!("{} {}", req.method(), req.path());
        let mut root = match TraceContext::extract(|header| req.header(header)) {
            Some(inbound) => tracer.join_span(name, &inbound),
            None => tracer.span(name),
        };
        root.set_tag(tag::SPAN_KIND, "server");
        req.bind_trace(tracer.clone(), root.handle());

        let response = self.route(req).await;

        root.set_tag(tag::HTTP_STATUS_CODE, response.status_code());
        root.finish();
        response
    }

    async fn route(&self, mut req: Request) -> Response {
        let Some((handler, params)) = self.router.lookup(req.method(), req.path()) else {
            return Response::status(Status::NotFound);
        };
        req.params = params;
        handler.call(req).await
    }
}
