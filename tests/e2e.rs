//! End-to-end tests for the native host
//!
//! Each test binds the JSONP server to an ephemeral port and fetches from it
//! through `HttpScriptHost`, so the full path is exercised: locator rewrite,
//! HTTP download, envelope evaluation, callback routing and teardown.

use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use jsonpbox::config::Config;
use jsonpbox::host::ScriptError;
use jsonpbox::host::native::HttpScriptHost;
use jsonpbox::{JsonpBackend, JsonpError, ReadyState, Request};

async fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, jsonpbox::server::router()).await.unwrap();
    });
    addr
}

fn backend() -> (Arc<HttpScriptHost>, JsonpBackend) {
    let config = Config::default();
    let host = Arc::new(HttpScriptHost::new(&config.host).unwrap());
    let backend = JsonpBackend::from_config(host.clone(), &config);
    (host, backend)
}

#[tokio::test]
async fn test_fetch_delivers_payload() {
    let addr = start_server().await;
    let (host, backend) = backend();

    let conn = backend
        .create_connection(Request::get(format!(
            "http://{addr}/jsonp?callback=JSONP_CALLBACK&q=rust"
        )))
        .unwrap();
    let response = conn.subscribe().unwrap().await.unwrap();

    assert_eq!(response.body, Some(json!({"q": "rust"})));
    assert_eq!(response.status, 200);
    assert_eq!(conn.ready_state(), ReadyState::Done);
    assert!(host.registry().is_empty());
    assert_eq!(host.attached(), 0);
}

#[tokio::test]
async fn test_fetch_trailing_placeholder() {
    let addr = start_server().await;
    let (_host, backend) = backend();

    let conn = backend
        .create_connection(Request::get(format!(
            "http://{addr}/jsonp?q=1&callback=JSONP_CALLBACK"
        )))
        .unwrap();
    let response = conn.subscribe().unwrap().await.unwrap();

    assert_eq!(response.body, Some(json!({"q": "1"})));
}

#[tokio::test]
async fn test_silent_script_fails_with_callback_not_invoked() {
    let addr = start_server().await;
    let (host, backend) = backend();

    let conn = backend
        .create_connection(Request::get(format!(
            "http://{addr}/jsonp/silent?callback=JSONP_CALLBACK"
        )))
        .unwrap();
    let err = conn.subscribe().unwrap().await.unwrap_err();

    assert!(matches!(err, JsonpError::CallbackNotInvoked));
    assert!(host.registry().is_empty());
    assert_eq!(host.attached(), 0);
}

#[tokio::test]
async fn test_http_failure_surfaces_script_error() {
    let addr = start_server().await;
    let (host, backend) = backend();

    let conn = backend
        .create_connection(Request::get(format!(
            "http://{addr}/jsonp/fail?callback=JSONP_CALLBACK"
        )))
        .unwrap();
    let err = conn.subscribe().unwrap().await.unwrap_err();

    assert!(matches!(
        err,
        JsonpError::Script(ScriptError::HttpStatus { status: 500 })
    ));
    assert!(host.registry().is_empty());
    assert_eq!(backend.metrics().snapshot().fetches_failed, 1);
}

#[tokio::test]
async fn test_cancel_releases_everything() {
    let addr = start_server().await;
    let (host, backend) = backend();

    let conn = backend
        .create_connection(Request::get(format!(
            "http://{addr}/jsonp?callback=JSONP_CALLBACK"
        )))
        .unwrap();
    let subscription = conn.subscribe().unwrap();
    assert_eq!(host.attached(), 1);
    assert_eq!(host.registry().len(), 1);

    drop(subscription);

    assert_eq!(conn.ready_state(), ReadyState::Cancelled);
    assert_eq!(host.attached(), 0);
    assert!(host.registry().is_empty());
    assert_eq!(backend.metrics().snapshot().fetches_cancelled, 1);
}

#[tokio::test]
async fn test_concurrent_fetches_are_independent() {
    let addr = start_server().await;
    let (host, backend) = backend();

    let a = backend
        .create_connection(Request::get(format!(
            "http://{addr}/jsonp?callback=JSONP_CALLBACK&n=a"
        )))
        .unwrap();
    let b = backend
        .create_connection(Request::get(format!(
            "http://{addr}/jsonp?callback=JSONP_CALLBACK&n=b"
        )))
        .unwrap();

    let (ra, rb) = tokio::join!(a.subscribe().unwrap(), b.subscribe().unwrap());

    assert_eq!(ra.unwrap().body, Some(json!({"n": "a"})));
    assert_eq!(rb.unwrap().body, Some(json!({"n": "b"})));
    assert!(host.registry().is_empty());
}
