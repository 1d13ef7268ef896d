use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::connection::JsonpConnection;
use crate::error::Result;
use crate::host::JsonpHost;
use crate::observability::Metrics;
use crate::request::Request;
use crate::response::ResponseOptions;

/// Factory for JSONP connections.
///
/// Holds the host collaborator and the response template shared by every
/// connection it creates. Stateless otherwise: each connection is a
/// one-shot fetch with no retry.
#[derive(Clone)]
pub struct JsonpBackend {
    host: Arc<dyn JsonpHost>,
    base_response_options: Option<ResponseOptions>,
    metrics: Arc<Metrics>,
}

impl JsonpBackend {
    pub fn new(host: Arc<dyn JsonpHost>, base_response_options: Option<ResponseOptions>) -> Self {
        Self {
            host,
            base_response_options,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Backend whose response template comes from the `[response]` section
    pub fn from_config(host: Arc<dyn JsonpHost>, config: &Config) -> Self {
        Self::new(host, Some(config.response.to_options()))
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn create_connection(&self, request: Request) -> Result<JsonpConnection> {
        debug!(method = %request.method, url = %request.url, "Creating JSONP connection");
        JsonpConnection::with_metrics(
            request,
            self.host.clone(),
            self.base_response_options.clone(),
            self.metrics.clone(),
        )
    }
}
