//! Integration tests for the coroutine host and in-memory channel transport
//!
//! # Test Coverage
//!
//! - One coroutine per exchange: slow deferred actions overlap
//! - Client cancellation aborts a parked deferred action with a 500
//! - Request ids supplied by the client are echoed back
//! - Accept loop shutdown via source exhaustion and via `ServerHandle::stop`
//!
//! # Test Strategy
//!
//! Each test builds a [`Host`] around a sample application, serves a
//! [`brrtdispatch::server::channel`] source and submits requests from the
//! test thread, waiting on the returned [`PendingResponse`]s.

mod common;

use std::io;
use std::time::{Duration, Instant};

use brrtdispatch::app::AppBuilder;
use brrtdispatch::cancel::CancellationToken;
use brrtdispatch::ids::RequestId;
use brrtdispatch::runtime_config::RuntimeConfig;
use brrtdispatch::server::{channel, Host, Incoming, PendingResponse, ResponseParts};
use common::{get, test_server::setup_may_runtime, SampleController};
use http::StatusCode;

fn sample_host() -> Host {
    setup_may_runtime();
    let mut app = AppBuilder::new(RuntimeConfig::default());
    app.use_tracing();
    app.map_controller::<SampleController>().unwrap();
    app.build_host()
}

#[test]
fn test_exchanges_run_concurrently() {
    let host = sample_host();
    let (sender, source) = channel();
    let handle = host.serve(source).unwrap();

    let start = Instant::now();
    let pending: Vec<PendingResponse> = (0..10)
        .map(|_| sender.send(get("/sample-slow/100")).unwrap())
        .collect();
    for response in pending {
        let response = response.wait().unwrap();
        assert_eq!(response.status, StatusCode::OK);
    }
    // Ten sequential sleeps would take a full second.
    assert!(start.elapsed() < Duration::from_millis(900));

    drop(sender);
    handle.join().unwrap();
}

#[test]
fn test_cancellation_aborts_deferred_action() {
    let host = sample_host();
    let (sender, source) = channel();
    let handle = host.serve(source).unwrap();

    let start = Instant::now();
    let pending = sender
        .send_with_cancellation(get("/sample-slow/5000"), CancellationToken::new())
        .unwrap();
    std::thread::sleep(Duration::from_millis(50));
    pending.cancel();
    let response = pending.wait().unwrap();

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(start.elapsed() < Duration::from_secs(2));

    drop(sender);
    handle.join().unwrap();
}

#[test]
fn test_cancelled_before_dispatch_never_invokes() {
    let host = sample_host();
    let (sender, source) = channel();
    let handle = host.serve(source).unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let response = sender
        .send_with_cancellation(get("/sample-slow/5000"), token)
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);

    drop(sender);
    handle.join().unwrap();
}

#[test]
fn test_request_id_is_echoed() {
    let host = sample_host();
    let (sender, source) = channel();
    let handle = host.serve(source).unwrap();

    let id = RequestId::new().to_string();
    let request = get("/sample-null").with_header("x-request-id", &id).unwrap();
    let response = sender.send(request).unwrap().wait().unwrap();
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert_eq!(response.header("x-request-id"), Some(id.as_str()));

    drop(sender);
    handle.join().unwrap();
}

#[test]
fn test_stop_closes_source() {
    let host = sample_host();
    let (sender, source) = channel();
    let handle = host.serve(source).unwrap();

    let response = sender.send(get("/sample/7")).unwrap().wait().unwrap();
    assert_eq!(response.json().unwrap()["id"], 7);

    handle.stop();
    let err = sender.send(get("/sample/7")).err().unwrap();
    assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
}

#[test]
fn test_dispatch_single_exchange() {
    let host = sample_host();
    let (tx, rx) = may::sync::mpsc::channel();
    let incoming = Incoming::new(
        get("/sample/3?page=2"),
        CancellationToken::new(),
        move |parts: ResponseParts| {
            let _ = tx.send(parts);
        },
    );
    host.dispatch(incoming).unwrap();
    let response = rx.recv().unwrap();
    assert_eq!(response.json().unwrap()["page"], 2);
}
