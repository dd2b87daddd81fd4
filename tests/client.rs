//! Outbound instrumented calls against a real downstream server.

use std::convert::Infallible;
use std::net::SocketAddr;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::StatusCode;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use filament::trace::{tag, MemoryCollector, Tracer, TracerConfig};
use filament::{Client, Error};

/// A downstream fixture: 200 on `/first`, 401 on `/second`, 404 otherwise.
/// Echoes any inbound `x-b3-traceid` back as an `echo-trace` header.
async fn downstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let svc = service_fn(|req: hyper::Request<Incoming>| async move {
                    let status = match req.uri().path() {
                        "/first" => StatusCode::OK,
                        "/second" => StatusCode::UNAUTHORIZED,
                        _ => StatusCode::NOT_FOUND,
                    };
                    let mut res = hyper::Response::new(Full::new(Bytes::new()));
                    *res.status_mut() = status;
                    if let Some(trace) = req.headers().get("x-b3-traceid") {
                        res.headers_mut().insert("echo-trace", trace.clone());
                    }
                    Ok::<_, Infallible>(res)
                });
                let _ = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), svc)
                    .await;
            });
        }
    });
    addr
}

fn test_client() -> (Client, Tracer, MemoryCollector) {
    let collector = MemoryCollector::new();
    let tracer = Tracer::with_collector(TracerConfig::new("client-test"), collector.clone());
    let client = Client::new(tracer.clone()).unwrap();
    (client, tracer, collector)
}

#[tokio::test]
async fn successful_call_records_the_full_tag_set() {
    let addr = downstream().await;
    let (client, _tracer, collector) = test_client();
    let url = format!("http://{addr}/first");

    let res = client.get(None, &url).await.unwrap();
    assert_eq!(res.status().as_u16(), 200);

    let spans = collector.spans();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].name, "GET /first");
    assert_eq!(spans[0].tag(tag::SPAN_KIND), Some("client"));
    assert_eq!(spans[0].tag(tag::HTTP_METHOD), Some("GET"));
    assert_eq!(spans[0].tag(tag::HTTP_URL), Some(url.as_str()));
    assert_eq!(spans[0].tag(tag::HTTP_STATUS_CODE), Some("200"));
}

#[tokio::test]
async fn error_status_is_a_result_not_a_failure() {
    let addr = downstream().await;
    let (client, _tracer, collector) = test_client();

    let res = client.get(None, &format!("http://{addr}/second")).await.unwrap();
    assert_eq!(res.status().as_u16(), 401);

    let spans = collector.spans();
    assert_eq!(spans[0].tag(tag::HTTP_STATUS_CODE), Some("401"));
    assert_eq!(spans[0].tag(tag::ERROR), None);
}

#[tokio::test]
async fn refused_connection_finishes_the_span_without_a_status() {
    // Bind and drop to get a port nothing listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let (client, _tracer, collector) = test_client();
    let url = format!("http://{addr}/first");

    let err = client.get(None, &url).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));

    let spans = collector.spans();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].tag(tag::HTTP_METHOD), Some("GET"));
    assert_eq!(spans[0].tag(tag::HTTP_URL), Some(url.as_str()));
    assert_eq!(spans[0].tag(tag::HTTP_STATUS_CODE), None);
    assert_eq!(spans[0].tag(tag::CANCELLED), None);
}

#[tokio::test]
async fn calls_under_a_parent_carry_the_trace_downstream() {
    let addr = downstream().await;
    let collector = MemoryCollector::new();
    let tracer = Tracer::with_collector(TracerConfig::new("client-test"), collector.clone());
    let client = Client::new(tracer.clone()).unwrap().with_peer_service("downstream");

    let root = tracer.span("run");
    let ctx = root.context();

    let res = client.get(Some(&ctx), &format!("http://{addr}/first")).await.unwrap();
    let echoed = res.headers().get("echo-trace").unwrap().to_str().unwrap();
    assert_eq!(echoed, ctx.trace_id.to_string());

    root.finish();

    let spans = collector.spans();
    assert_eq!(spans.len(), 2);
    // The call span finished first; the run root came after.
    assert_eq!(spans[0].trace_id, spans[1].trace_id);
    assert_eq!(spans[0].parent_id.as_deref(), Some(spans[1].id.as_str()));
    assert_eq!(spans[0].tag(tag::PEER_SERVICE), Some("downstream"));
}
