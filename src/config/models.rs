use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;

use crate::host::registry::DEFAULT_NAMESPACE;
use crate::response::ResponseOptions;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub response: ResponseConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Native host configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostConfig {
    /// Object path injected scripts call into, e.g. `__jsonp__`
    #[serde(default = "default_callback_namespace")]
    pub callback_namespace: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_script_bytes")]
    pub max_script_bytes: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            callback_namespace: default_callback_namespace(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            user_agent: default_user_agent(),
            max_script_bytes: default_max_script_bytes(),
        }
    }
}

fn default_callback_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_user_agent() -> String {
    "jsonpbox/0.1.0".to_string()
}

fn default_max_script_bytes() -> u64 {
    1024 * 1024 // 1 MB
}

/// Response template merged under every delivered payload
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResponseConfig {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default = "default_status_text")]
    pub status_text: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            status: default_status(),
            status_text: default_status_text(),
            headers: BTreeMap::new(),
        }
    }
}

impl ResponseConfig {
    pub fn to_options(&self) -> ResponseOptions {
        ResponseOptions {
            status: Some(self.status),
            status_text: Some(self.status_text.clone()),
            headers: self.headers.clone(),
            ..Default::default()
        }
    }
}

fn default_status() -> u16 {
    200
}

fn default_status_text() -> String {
    "Ok".to_string()
}

/// Caller-side fetch settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    /// How long the CLI waits before withdrawing from a fetch
    #[serde(default = "default_fetch_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

fn default_fetch_timeout_ms() -> u64 {
    30_000
}

/// JSONP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.host.callback_namespace, "__jsonp__");
        assert_eq!(config.host.max_script_bytes, 1024 * 1024);
        assert_eq!(config.response.status, 200);
        assert_eq!(config.fetch.timeout_ms, 30_000);
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn test_response_config_to_options() {
        let mut response = ResponseConfig::default();
        response.headers.insert("x-a".into(), "1".into());

        let options = response.to_options();
        assert_eq!(options.status, Some(200));
        assert_eq!(options.status_text.as_deref(), Some("Ok"));
        assert_eq!(options.body, None);
        assert_eq!(options.headers.len(), 1);
    }
}
