//! Instrumented outbound calls — a root span covering two downstream
//! requests, each in a client span of its own, with B3 headers carrying the
//! trace to the other side.
//!
//! Run the traced-service example in another terminal first, then:
//!   RUST_LOG=debug cargo run --example client-spans
//!
//! Kill the service and run it again to see the transport-failure shape:
//! the client spans still export, tagged with method and URL but no status.

use filament::trace::{Tracer, TracerConfig};
use filament::{Client, Error};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let tracer = Tracer::new(
        TracerConfig::new("demo-client").with_debug(true),
    )?;
    let client = Client::new(tracer.clone())?.with_peer_service("demo-service");

    let mut root = tracer.span("demo-run");
    let ctx = root.context();
    info!(trace = %ctx.trace_id, "starting run");

    match client.get(Some(&ctx), "http://localhost:3000/users/1").await {
        Ok(res) => info!(status = res.status().as_u16(), "first call"),
        Err(e) => warn!("first call failed: {e}"),
    }

    match client.get(Some(&ctx), "http://localhost:3000/users/2").await {
        Ok(res) => info!(status = res.status().as_u16(), "second call"),
        Err(e) => warn!("second call failed: {e}"),
    }

    root.set_tag("calls", 2);
    root.finish();

    // Everything above was fire-and-forget; this is the moment the spans
    // actually leave the process.
    tracer.shutdown().await;
    Ok(())
}
