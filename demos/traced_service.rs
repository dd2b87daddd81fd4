//! A traced service — every request runs under a span, with a request id
//! and a middleware child span, and finished spans stream to a zipkin-style
//! collector endpoint.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example traced-service
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl -X PUT -d '{"name":"renamed"}' http://localhost:3000/users/42
//!   curl -H 'x-request-id: abc-123' http://localhost:3000/users/42
//!   curl -H 'x-b3-traceid: 463ac35c9f6413ad48485a3953bb6124' \
//!        -H 'x-b3-spanid: 432fc53cb2d7b609' \
//!        http://localhost:3000/users/42        # joins the caller's trace
//!   curl http://localhost:3000/healthz

use filament::middleware::{Chain, RequestId, Trace};
use filament::trace::{Tracer, TracerConfig};
use filament::{health, Dispatcher, Request, Response, Router, Server, Status};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let tracer = Tracer::new(
        TracerConfig::new("demo-service")
            .with_endpoint("http://localhost:9411/api/v2/spans"),
    )
    .expect("tracer setup");

    // First unit is outermost: RequestId tags the root span before Trace
    // opens its child around the handler.
    let chain = Chain::new().with(RequestId::new()).with(Trace::new());

    let app = Router::new()
        .get("/users/{id}",    chain.wrap(get_user))
        .post("/users",        chain.wrap(create_user))
        .put("/users/{id}",    chain.wrap(update_user))
        .delete("/users/{id}", chain.wrap(delete_user))
        // Probes stay outside the chain: kubelet traffic is noise in a trace.
        .get("/healthz",       health::liveness)
        .get("/readyz",        health::readiness);

    let dispatcher = Dispatcher::new(app).with_tracer(tracer.clone());

    Server::bind("0.0.0.0:3000")
        .serve(dispatcher)
        .await
        .expect("server error");

    // Server drained; ship whatever spans are still queued.
    tracer.shutdown().await;
}

// GET /users/{id}
async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#).into_bytes())
}

// POST /users
//
// The handler can read its own correlation id; handy for echoing it to the
// caller or stamping it on writes.
async fn create_user(req: Request) -> Response {
    if req.body().is_empty() {
        return Response::status(Status::BadRequest);
    }

    let request_id = req.request_id().unwrap_or("-").to_owned();
    Response::builder()
        .status(Status::Created)
        .header("location", "/users/99")
        .header("x-request-id", &request_id)
        .json(r#"{"id":"99","name":"new_user"}"#.to_owned().into_bytes())
}

// PUT /users/{id}
async fn update_user(req: Request) -> Response {
    if req.body().is_empty() {
        return Response::status(Status::BadRequest);
    }

    let id = req.param("id").unwrap_or("unknown");
    Response::json(format!(r#"{{"id":"{id}","name":"renamed"}}"#).into_bytes())
}

// DELETE /users/{id} → 204 No Content
async fn delete_user(_req: Request) -> Response {
    Response::status(Status::NoContent)
}
