//! # filament
//!
//! A minimal HTTP framework that traces every request.
//!
//! ## The contract
//!
//! nginx handles TLS, rate limiting, slow clients, and body-size limits.
//! filament does not — by design. The proxy does proxy things. The framework
//! does framework things. What the proxy cannot do for you is explain a slow
//! request three services deep, and that is the part filament takes
//! seriously: every request runs under a span, middleware compose around
//! handlers without losing track of who started what, and outbound calls
//! carry the trace onward.
//!
//! What nginx / ingress already owns — filament intentionally ignores:
//!
//! - **Body-size limits** — `client_max_body_size` in nginx
//! - **Rate limiting** — `limit_req` / ingress-nginx annotations
//! - **Slow-client protection** — nginx timeout and buffer settings
//! - **TLS termination** — nginx SSL / k8s ingress
//!
//! What's left for filament:
//!
//! - Radix-tree routing — O(path-length) lookup via [`matchit`]
//! - Middleware — an ordered [`Chain`](middleware::Chain) of units composed
//!   around each handler, first unit outermost
//! - Distributed tracing — an explicit [`Tracer`](trace::Tracer), one root
//!   span per request, B3 propagation in and out, spans batched to a
//!   collector in the background
//! - Graceful shutdown — SIGTERM / Ctrl-C, drains in-flight requests
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use filament::middleware::{Chain, RequestId, Trace};
//! use filament::trace::{Tracer, TracerConfig};
//! use filament::{health, Dispatcher, Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), filament::Error> {
//!     let tracer = Tracer::new(TracerConfig::new("user-service"))?;
//!     let chain = Chain::new().with(RequestId::new()).with(Trace::new());
//!
//!     let app = Router::new()
//!         .get("/healthz", health::liveness)
//!         .get("/users/{id}", chain.wrap(get_user));
//!
//!     let dispatcher = Dispatcher::new(app).with_tracer(tracer.clone());
//!     Server::bind("0.0.0.0:3000").serve(dispatcher).await?;
//!
//!     // The server has drained; ship whatever spans are still queued.
//!     tracer.shutdown().await;
//!     Ok(())
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#).into_bytes())
//! }
//! ```

mod client;
mod dispatch;
mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;
mod status;

pub mod health;
pub mod middleware;
pub mod trace;

pub use client::Client;
pub use dispatch::Dispatcher;
pub use error::Error;
pub use handler::{BoxFuture, BoxedHandler, Chained, ErasedHandler, Handler};
pub use method::Method;
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response};
pub use router::Router;
pub use server::Server;
pub use status::Status;
