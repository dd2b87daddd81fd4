//! Middleware: composable units wrapped around a handler.
//!
//! A middleware unit is a transformation on handlers: it receives the next
//! handler in line and returns a new handler that runs its own logic before
//! and/or after delegating. Units compose through [`Chain`], which folds an
//! ordered list of them around a terminal handler at registration time, so
//! the per-request cost is just the nested calls.
//!
//! Execution order is fixed and worth memorising: **the first unit in the
//! chain is the outermost wrapper**. For `Chain::new().with(a).with(b)`
//! around terminal `t`, a request runs
//!
//! ```text
//! a.before → b.before → t → b.after → a.after
//! ```
//!
//! Built-in units:
//! - [`RequestId`] — correlation id per request, reused from
//!   `x-request-id` when the caller sent one.
//! - [`Trace`] — per-request child span with method, path, status, latency.
//!
//! Units that only need a closure can skip the trait:
//!
//! ```rust
//! use std::sync::Arc;
//! use filament::middleware::Chain;
//! use filament::{BoxedHandler, ErasedHandler, Handler, Request, Response};
//!
//! // Rejects oversized bodies before the rest of the stack runs.
//! let limit = |next: BoxedHandler| {
//!     (move |req: Request| {
//!         let next = Arc::clone(&next);
//!         async move {
//!             if req.body().len() > 1 << 20 {
//!                 return Response::status(filament::Status::ContentTooLarge);
//!             }
//!             next.call(req).await
//!         }
//!     })
//!     .into_boxed_handler()
//! };
//!
//! let chain = Chain::new().with(limit);
//! ```

use std::sync::Arc;

use crate::handler::{BoxedHandler, Chained, Handler};

pub mod request_id;
pub mod trace;

pub use request_id::{Generator, RequestId, UuidGenerator};
pub use trace::Trace;

// ── Middleware trait ──────────────────────────────────────────────────────────

/// A unit of middleware.
///
/// `wrap` is called once per composition, not per request: do per-instance
/// setup in your constructor, capture it in the returned handler, and keep
/// the per-request work inside that handler. Units hold configuration only;
/// anything mutable they share across requests must synchronize itself.
pub trait Middleware: Send + Sync + 'static {
    /// Returns the handler that runs this unit around `next`.
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler;
}

/// Any `Fn(BoxedHandler) -> BoxedHandler` composes as a unit.
impl<F> Middleware for F
where
    F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        self(next)
    }
}

/// Sharing one unit between chains (or registering it twice in one chain)
/// works through `Arc`; each occurrence still wraps independently.
impl<M> Middleware for Arc<M>
where
    M: Middleware + ?Sized,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        (**self).wrap(next)
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

/// An ordered list of middleware units, composed around handlers on demand.
///
/// Build the chain once, then [`wrap`](Chain::wrap) each terminal handler at
/// route registration:
///
/// ```rust,no_run
/// use filament::middleware::{Chain, RequestId, Trace};
/// use filament::{Request, Response, Router};
///
/// # async fn get_user(_: Request) -> Response { Response::text("") }
/// # async fn create_user(_: Request) -> Response { Response::text("") }
/// let chain = Chain::new().with(RequestId::new()).with(Trace::new());
///
/// let app = Router::new()
///     .get("/users/{id}", chain.wrap(get_user))
///     .post("/users", chain.wrap(create_user));
/// ```
///
/// Order is registration order, first unit outermost. Nothing deduplicates:
/// a unit added twice runs twice, each occurrence with its own before and
/// after.
pub struct Chain {
    units: Vec<Box<dyn Middleware>>,
}

impl Chain {
    pub fn new() -> Self {
        Self { units: Vec::new() }
    }

    /// Appends a unit to the chain. Returns `self` for chaining.
    pub fn with(mut self, unit: impl Middleware) -> Self {
        self.units.push(Box::new(unit));
        self
    }

    /// Number of units in the chain.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Composes the chain around `terminal` and returns the result as a
    /// registrable handler.
    ///
    /// Folds from the last unit to the first, so the first unit ends up
    /// outermost. An empty chain yields the terminal unchanged in behavior.
    pub fn wrap(&self, terminal: impl Handler) -> Chained {
        let mut stack = terminal.into_boxed_handler();
        for unit in self.units.iter().rev() {
            stack = unit.wrap(stack);
        }
        Chained(stack)
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}
