//! JSONP endpoint for development and end-to-end tests
//!
//! `GET /jsonp?callback=<name>&k=v` answers with a script calling `<name>`
//! with the remaining query parameters as a JSON object. Two extra routes
//! exercise the failure paths of a JSONP client: `/jsonp/silent` serves a
//! script that never calls back, `/jsonp/fail` answers 500.

use axum::{
    Router,
    extract::Query,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::host::envelope::is_callee;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

const JAVASCRIPT: &str = "application/javascript; charset=utf-8";
const CALLBACK_PARAM: &str = "callback";

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/jsonp", get(jsonp))
        .route("/jsonp/silent", get(silent))
        .route("/jsonp/fail", get(fail))
        .layer(TraceLayer::new_for_http())
}

pub async fn run(address: SocketAddr) -> Result<(), AnyError> {
    let listener = TcpListener::bind(address).await?;
    info!(%address, "JSONP server listening");

    axum::serve(listener, router().into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Render the script body a JSONP endpoint returns
pub fn render_script(callback: &str, payload: &Value) -> String {
    format!("/**/ {callback}({payload});")
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn jsonp(Query(params): Query<BTreeMap<String, String>>) -> impl IntoResponse {
    let Some(callback) = params.get(CALLBACK_PARAM) else {
        return (StatusCode::BAD_REQUEST, "missing callback parameter").into_response();
    };
    if !is_callee(callback) {
        return (StatusCode::BAD_REQUEST, "invalid callback name").into_response();
    }

    let payload: Map<String, Value> = params
        .iter()
        .filter(|(key, _)| key.as_str() != CALLBACK_PARAM)
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect();

    (
        [(header::CONTENT_TYPE, JAVASCRIPT)],
        render_script(callback, &Value::Object(payload)),
    )
        .into_response()
}

async fn silent() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, JAVASCRIPT)], "/* nothing to see */")
}

async fn fail() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "upstream failure")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::envelope;
    use serde_json::json;

    #[test]
    fn test_render_script_parses_back() {
        let script = render_script("ns.__req3.finished", &json!({"q": "rust"}));
        let invocation = envelope::parse(&script).unwrap();
        assert_eq!(invocation.callee, "ns.__req3.finished");
        assert_eq!(invocation.payload, Some(json!({"q": "rust"})));
    }
}
