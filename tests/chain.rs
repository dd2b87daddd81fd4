//! Middleware composition: execution order is the contract.

use std::sync::{Arc, Mutex};

use filament::middleware::{Chain, Middleware};
use filament::{BoxedHandler, Handler, Method, Request, Response, Status};

type Log = Arc<Mutex<Vec<String>>>;

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// A unit that records when its before and after logic run.
fn recorder(label: &'static str, log: Log) -> impl Middleware {
    move |next: BoxedHandler| {
        let log = Arc::clone(&log);
        (move |req: Request| {
            let next = Arc::clone(&next);
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(format!("{label}.before"));
                let response = next.call(req).await;
                log.lock().unwrap().push(format!("{label}.after"));
                response
            }
        })
        .into_boxed_handler()
    }
}

/// A terminal handler that records its visit.
fn terminal(log: Log) -> impl Handler {
    move |_req: Request| {
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push("terminal".to_owned());
            Response::text("done")
        }
    }
}

#[tokio::test]
async fn first_unit_is_outermost() {
    let log = new_log();
    let chain = Chain::new()
        .with(recorder("a", Arc::clone(&log)))
        .with(recorder("b", Arc::clone(&log)))
        .with(recorder("c", Arc::clone(&log)));
    assert_eq!(chain.len(), 3);
    let stack = chain.wrap(terminal(Arc::clone(&log)));

    let response = stack.call(Request::new(Method::Get, "/")).await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(
        entries(&log),
        ["a.before", "b.before", "c.before", "terminal", "c.after", "b.after", "a.after"]
    );
}

#[tokio::test]
async fn empty_chain_behaves_like_the_terminal() {
    let log = new_log();
    let chain = Chain::new();
    assert!(chain.is_empty());
    let stack = chain.wrap(terminal(Arc::clone(&log)));

    let response = stack.call(Request::new(Method::Get, "/")).await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.body(), b"done");
    assert_eq!(entries(&log), ["terminal"]);
}

#[tokio::test]
async fn duplicate_units_run_independently() {
    let log = new_log();
    let unit = Arc::new(recorder("dup", Arc::clone(&log)));
    let chain = Chain::new().with(Arc::clone(&unit)).with(unit);
    let stack = chain.wrap(terminal(Arc::clone(&log)));

    stack.call(Request::new(Method::Get, "/")).await;

    assert_eq!(
        entries(&log),
        ["dup.before", "dup.before", "terminal", "dup.after", "dup.after"]
    );
}

#[tokio::test]
async fn short_circuit_skips_inner_layers_but_not_outer_afters() {
    let log = new_log();
    let gate = {
        let log = Arc::clone(&log);
        move |next: BoxedHandler| {
            let log = Arc::clone(&log);
            (move |req: Request| {
                let next = Arc::clone(&next);
                let log = Arc::clone(&log);
                async move {
                    if req.header("authorization").is_none() {
                        log.lock().unwrap().push("gate.reject".to_owned());
                        return Response::status(Status::Unauthorized);
                    }
                    next.call(req).await
                }
            })
            .into_boxed_handler()
        }
    };

    let chain = Chain::new()
        .with(recorder("outer", Arc::clone(&log)))
        .with(gate);
    let stack = chain.wrap(terminal(Arc::clone(&log)));

    let response = stack.call(Request::new(Method::Get, "/")).await;

    assert_eq!(response.status_code(), 401);
    // The gate never called down, but the outer unit's after-logic still ran.
    assert_eq!(entries(&log), ["outer.before", "gate.reject", "outer.after"]);
}

#[tokio::test]
async fn one_chain_wraps_many_terminals() {
    let log = new_log();
    let chain = Chain::new().with(recorder("m", Arc::clone(&log)));

    let first = chain.wrap(terminal(Arc::clone(&log)));
    let second = chain.wrap(terminal(Arc::clone(&log)));

    first.call(Request::new(Method::Get, "/")).await;
    second.call(Request::new(Method::Get, "/")).await;

    assert_eq!(
        entries(&log),
        ["m.before", "terminal", "m.after", "m.before", "terminal", "m.after"]
    );
}
