//! Correlation-id middleware and the id-generation seam.

use std::sync::Arc;

use tracing::warn;

use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::middleware::Middleware;
use crate::request::Request;
use crate::trace::tag;

/// Header carrying the correlation id, inbound and (by convention) outbound.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// ── Generator ─────────────────────────────────────────────────────────────────

/// Produces correlation identifiers.
///
/// The seam exists so deployments with their own id scheme (and tests) can
/// swap the source; everyone else uses [`UuidGenerator`].
pub trait Generator: Send + Sync + 'static {
    fn generate(&self) -> Result<String, Error>;
}

/// Default generator: random UUID v4.
pub struct UuidGenerator;

impl Generator for UuidGenerator {
    fn generate(&self) -> Result<String, Error> {
        Ok(uuid::Uuid::new_v4().to_string())
    }
}

// ── RequestId ─────────────────────────────────────────────────────────────────

/// Pre-only unit: every request gets a correlation id.
///
/// An inbound `x-request-id` header wins, so ids survive hops through
/// services that all run this unit; otherwise a fresh id is generated. The
/// id lands on the request ([`Request::request_id`]) and, when the request
/// is traced, on the active span as the `request_id` tag.
///
/// Generation failure is logged and the request proceeds without an id.
/// Correlation is instrumentation; it does not get to fail a request.
pub struct RequestId {
    generator: Arc<dyn Generator>,
}

impl RequestId {
    pub fn new() -> Self {
        Self::with_generator(UuidGenerator)
    }

    /// A unit drawing ids from a custom source.
    pub fn with_generator(generator: impl Generator) -> Self {
        Self { generator: Arc::new(generator) }
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for RequestId {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        let generator = Arc::clone(&self.generator);
        (move |mut req: Request| {
            let next = Arc::clone(&next);
            let generator = Arc::clone(&generator);
            async move {
                let id = match req.header(REQUEST_ID_HEADER) {
                    Some(inbound) => Some(inbound.to_owned()),
                    None => match generator.generate() {
                        Ok(fresh) => Some(fresh),
                        Err(e) => {
                            warn!("request id generation failed: {e}");
                            None
                        }
                    },
                };
                if let Some(id) = id {
                    if let Some(span) = req.span() {
                        if let Err(e) = span.set_tag(tag::REQUEST_ID, id.as_str()) {
                            warn!("request id tag dropped: {e}");
                        }
                    }
                    req.set_request_id(id);
                }
                next.call(req).await
            }
        })
        .into_boxed_handler()
    }
}
