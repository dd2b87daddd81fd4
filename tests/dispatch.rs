//! Dispatch: every request runs under a root span, and the root closes
//! on every exit path.

use std::sync::{Arc, Mutex};

use filament::middleware::{Chain, Generator, RequestId, Trace};
use filament::trace::{tag, MemoryCollector, TraceContext, Tracer, TracerConfig};
use filament::{
    BoxedHandler, Dispatcher, Error, Handler, Method, Request, Response, Router, Status,
};

fn traced_dispatcher(router: Router) -> (Dispatcher, MemoryCollector) {
    let collector = MemoryCollector::new();
    let tracer = Tracer::with_collector(TracerConfig::new("dispatch-test"), collector.clone());
    (Dispatcher::new(router).with_tracer(tracer), collector)
}

async fn hello(_req: Request) -> Response {
    Response::text("hello")
}

async fn echo_request_id(req: Request) -> Response {
    Response::text(req.request_id().unwrap_or("none").to_owned())
}

#[tokio::test]
async fn routed_request_runs_under_a_root_span() {
    let app = Router::new().get("/hello", hello);
    let (dispatcher, collector) = traced_dispatcher(app);

    let res = dispatcher.handle(Request::new(Method::Get, "/hello")).await;

    assert_eq!(res.status_code(), 200);
    let spans = collector.spans();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].name, "GET /hello");
    assert_eq!(spans[0].parent_id, None);
    assert_eq!(spans[0].tag(tag::SPAN_KIND), Some("server"));
    assert_eq!(spans[0].tag(tag::HTTP_STATUS_CODE), Some("200"));
}

#[tokio::test]
async fn trace_unit_opens_a_child_and_rebinds_the_request() {
    let seen: Arc<Mutex<Option<TraceContext>>> = Arc::new(Mutex::new(None));
    let witness = {
        let seen = Arc::clone(&seen);
        move |next: BoxedHandler| {
            let seen = Arc::clone(&seen);
            (move |req: Request| {
                let next = Arc::clone(&next);
                let seen = Arc::clone(&seen);
                async move {
                    *seen.lock().unwrap() = req.trace_context();
                    next.call(req).await
                }
            })
            .into_boxed_handler()
        }
    };

    let chain = Chain::new().with(Trace::new()).with(witness);
    let app = Router::new().get("/hello", chain.wrap(hello));
    let (dispatcher, collector) = traced_dispatcher(app);

    dispatcher.handle(Request::new(Method::Get, "/hello")).await;

    let spans = collector.spans();
    assert_eq!(spans.len(), 2);
    let root = spans.iter().find(|s| s.parent_id.is_none()).unwrap();
    let child = spans.iter().find(|s| s.parent_id.is_some()).unwrap();
    assert_eq!(child.trace_id, root.trace_id);
    assert_eq!(child.parent_id.as_deref(), Some(root.id.as_str()));
    assert_eq!(child.tag(tag::HTTP_METHOD), Some("GET"));

    // The witness sat below the Trace unit and saw the same trace.
    let observed = seen.lock().unwrap().expect("witness never ran");
    assert_eq!(observed.trace_id.to_string(), root.trace_id);
}

#[tokio::test]
async fn failing_handler_still_closes_every_span() {
    async fn broken(_req: Request) -> Response {
        Response::status(Status::InternalServerError)
    }

    let chain = Chain::new().with(Trace::new());
    let app = Router::new().get("/broken", chain.wrap(broken));
    let (dispatcher, collector) = traced_dispatcher(app);

    let res = dispatcher.handle(Request::new(Method::Get, "/broken")).await;

    assert_eq!(res.status_code(), 500);
    let spans = collector.spans();
    assert_eq!(spans.len(), 2);
    for span in &spans {
        assert_eq!(span.tag(tag::HTTP_STATUS_CODE), Some("500"));
        assert_eq!(span.tag(tag::CANCELLED), None);
    }
}

#[tokio::test]
async fn panicking_handler_closes_every_span_with_error() {
    async fn exploding(_req: Request) -> Response {
        panic!("boom");
    }

    let chain = Chain::new().with(Trace::new());
    let app = Router::new().get("/boom", chain.wrap(exploding));
    let (dispatcher, collector) = traced_dispatcher(app);

    let task =
        tokio::spawn(async move { dispatcher.handle(Request::new(Method::Get, "/boom")).await });
    assert!(task.await.is_err());

    // Both the middleware child and the root closed through their drop
    // guards on the unwind path.
    let spans = collector.spans();
    assert_eq!(spans.len(), 2);
    for span in &spans {
        assert_eq!(span.tag(tag::ERROR), Some("true"));
        assert_eq!(span.tag(tag::HTTP_STATUS_CODE), None);
    }
}

#[tokio::test]
async fn inbound_b3_headers_join_the_trace() {
    let app = Router::new().get("/hello", hello);
    let (dispatcher, collector) = traced_dispatcher(app);

    let req = Request::new(Method::Get, "/hello")
        .with_header("x-b3-traceid", "463ac35c9f6413ad48485a3953bb6124")
        .with_header("x-b3-spanid", "432fc53cb2d7b609");
    dispatcher.handle(req).await;

    let spans = collector.spans();
    assert_eq!(spans[0].trace_id, "463ac35c9f6413ad48485a3953bb6124");
    assert_eq!(spans[0].id, "432fc53cb2d7b609");
    assert!(spans[0].shared);
}

#[tokio::test]
async fn malformed_b3_headers_start_a_fresh_trace() {
    let app = Router::new().get("/hello", hello);
    let (dispatcher, collector) = traced_dispatcher(app);

    let req = Request::new(Method::Get, "/hello")
        .with_header("x-b3-traceid", "not hex at all")
        .with_header("x-b3-spanid", "432fc53cb2d7b609");
    dispatcher.handle(req).await;

    let spans = collector.spans();
    assert_ne!(spans[0].trace_id, "not hex at all");
    assert!(!spans[0].shared);
}

#[tokio::test]
async fn unrouted_requests_still_get_a_root_span() {
    let app = Router::new().get("/hello", hello);
    let (dispatcher, collector) = traced_dispatcher(app);

    let res = dispatcher.handle(Request::new(Method::Get, "/nope")).await;

    assert_eq!(res.status_code(), 404);
    let spans = collector.spans();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].name, "GET /nope");
    assert_eq!(spans[0].tag(tag::HTTP_STATUS_CODE), Some("404"));
}

#[tokio::test]
async fn without_a_tracer_requests_run_untraced() {
    let chain = Chain::new().with(Trace::new());
    let app = Router::new().get("/hello", chain.wrap(hello));
    let dispatcher = Dispatcher::new(app);

    let res = dispatcher.handle(Request::new(Method::Get, "/hello")).await;

    assert_eq!(res.status_code(), 200);
}

#[tokio::test]
async fn path_params_reach_the_handler() {
    async fn show(req: Request) -> Response {
        Response::text(req.param("id").unwrap_or("?").to_owned())
    }

    let app = Router::new().get("/users/{id}", show);
    let (dispatcher, _collector) = traced_dispatcher(app);

    let res = dispatcher.handle(Request::new(Method::Get, "/users/42")).await;

    assert_eq!(res.body(), b"42");
}

#[tokio::test]
async fn request_bodies_reach_put_handlers() {
    async fn replace(req: Request) -> Response {
        Response::text(format!(
            "{}:{}",
            req.param("id").unwrap_or("?"),
            String::from_utf8_lossy(req.body())
        ))
    }

    let app = Router::new().put("/users/{id}", replace);
    let (dispatcher, _collector) = traced_dispatcher(app);

    let req = Request::new(Method::Put, "/users/7").with_body(b"renamed".to_vec());
    let res = dispatcher.handle(req).await;

    assert_eq!(res.body(), b"7:renamed");
}

#[tokio::test]
async fn inbound_request_id_is_reused() {
    let chain = Chain::new().with(RequestId::new());
    let app = Router::new().get("/id", chain.wrap(echo_request_id));
    let (dispatcher, collector) = traced_dispatcher(app);

    let req = Request::new(Method::Get, "/id").with_header("x-request-id", "abc-123");
    let res = dispatcher.handle(req).await;

    assert_eq!(res.body(), b"abc-123");
    assert_eq!(collector.spans()[0].tag(tag::REQUEST_ID), Some("abc-123"));
}

#[tokio::test]
async fn missing_request_id_is_generated() {
    let chain = Chain::new().with(RequestId::new());
    let app = Router::new().get("/id", chain.wrap(echo_request_id));
    let (dispatcher, _collector) = traced_dispatcher(app);

    let res = dispatcher.handle(Request::new(Method::Get, "/id")).await;

    let body = String::from_utf8(res.body().to_vec()).unwrap();
    assert_eq!(body.len(), 36, "expected a uuid, got {body:?}");
    assert_eq!(body.matches('-').count(), 4);
}

#[tokio::test]
async fn failing_generator_never_fails_the_request() {
    struct Broken;

    impl Generator for Broken {
        fn generate(&self) -> Result<String, Error> {
            Err(Error::Id("entropy pool on strike".to_owned()))
        }
    }

    let chain = Chain::new().with(RequestId::with_generator(Broken));
    let app = Router::new().get("/id", chain.wrap(echo_request_id));
    let (dispatcher, collector) = traced_dispatcher(app);

    let res = dispatcher.handle(Request::new(Method::Get, "/id")).await;

    assert_eq!(res.status_code(), 200);
    assert_eq!(res.body(), b"none");
    assert_eq!(collector.spans()[0].tag(tag::REQUEST_ID), None);
}
