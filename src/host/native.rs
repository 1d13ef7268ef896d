//! Native host: script injection over plain HTTP
//!
//! Submitting an element spawns a task that downloads the script, evaluates
//! its JSONP envelope against the callback registry and then dispatches
//! `load`, or dispatches `error` when the download fails. This mirrors the
//! ordering a browser gives: the callback runs before the load signal.

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::envelope;
use super::{
    CallbackRegistry, CallbackTarget, JsonpHost, Listener, ListenerId, ListenerSet, RequestId,
    ScriptElement, ScriptError, Signal, SignalEvent, lock,
};
use crate::config::HostConfig;

/// Source of script bodies
#[async_trait]
pub trait ScriptLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<String, ScriptError>;
}

/// HTTP loader configuration
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub max_script_bytes: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            user_agent: "jsonpbox/0.1.0".to_string(),
            max_script_bytes: 1024 * 1024,
        }
    }
}

impl From<&HostConfig> for LoaderConfig {
    fn from(config: &HostConfig) -> Self {
        Self {
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            user_agent: config.user_agent.clone(),
            max_script_bytes: config.max_script_bytes,
        }
    }
}

/// Loads scripts with reqwest
pub struct HttpLoader {
    client: Client,
    config: LoaderConfig,
}

impl HttpLoader {
    pub fn new(config: LoaderConfig) -> Result<Self, ScriptError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| ScriptError::RequestFailed(e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl ScriptLoader for HttpLoader {
    async fn load(&self, url: &str) -> Result<String, ScriptError> {
        debug!(url, "Loading script");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_builder() {
                ScriptError::InvalidUrl(url.to_string())
            } else if e.is_timeout() {
                ScriptError::RequestFailed(format!("timed out: {e}"))
            } else {
                ScriptError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScriptError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let limit = self.config.max_script_bytes;
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(ScriptError::TooLarge { limit });
        }

        let body = read_limited(response, limit).await?;
        debug!(url, size = body.len(), "Script loaded");
        Ok(body)
    }
}

/// Read the body chunk by chunk, failing as soon as it exceeds `limit` bytes
async fn read_limited(mut response: reqwest::Response, limit: u64) -> Result<String, ScriptError> {
    let mut body: Vec<u8> = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| ScriptError::RequestFailed(format!("failed to read body: {e}")))?
    {
        if (body.len() + chunk.len()) as u64 > limit {
            return Err(ScriptError::TooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }

    String::from_utf8(body)
        .map_err(|e| ScriptError::RequestFailed(format!("script is not valid UTF-8: {e}")))
}

/// Element created by [`HttpScriptHost`]
pub struct HttpScript {
    src: String,
    listeners: ListenerSet,
    task: Mutex<Option<JoinHandle<()>>>,
    detached: AtomicBool,
}

impl HttpScript {
    fn new(src: &str) -> Self {
        Self {
            src: src.to_string(),
            listeners: ListenerSet::new(),
            task: Mutex::new(None),
            detached: AtomicBool::new(false),
        }
    }

    fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
    }

    fn dispatch(&self, event: SignalEvent) {
        if self.detached.load(Ordering::SeqCst) {
            debug!(src = %self.src, "Dropping signal for detached script");
            return;
        }
        self.listeners.dispatch(&event);
    }
}

impl ScriptElement for HttpScript {
    fn src(&self) -> String {
        self.src.clone()
    }

    fn add_listener(&self, signal: Signal, listener: Listener) -> ListenerId {
        self.listeners.add(signal, listener)
    }

    fn remove_listener(&self, signal: Signal, id: ListenerId) {
        self.listeners.remove(signal, id)
    }
}

type ScriptKey = usize;

fn script_key(script: &Arc<dyn ScriptElement>) -> ScriptKey {
    Arc::as_ptr(script).cast::<()>() as usize
}

/// Host that injects scripts by downloading and evaluating them
pub struct HttpScriptHost {
    registry: Arc<CallbackRegistry>,
    loader: Arc<dyn ScriptLoader>,
    scripts: DashMap<ScriptKey, Arc<HttpScript>>,
}

impl HttpScriptHost {
    pub fn new(config: &HostConfig) -> Result<Self, ScriptError> {
        let loader = HttpLoader::new(LoaderConfig::from(config))?;
        Ok(Self::with_loader(
            Arc::new(CallbackRegistry::new(config.callback_namespace.clone())),
            Arc::new(loader),
        ))
    }

    pub fn with_loader(registry: Arc<CallbackRegistry>, loader: Arc<dyn ScriptLoader>) -> Self {
        Self {
            registry,
            loader,
            scripts: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    /// Number of built elements not yet cleaned up
    pub fn attached(&self) -> usize {
        self.scripts.len()
    }
}

/// Run a script body: invoke the callback it names, if it names one
fn evaluate(registry: &CallbackRegistry, src: &str, body: &str) {
    match envelope::parse(body) {
        Ok(invocation) => {
            if let Err(e) = registry.deliver(&invocation.callee, invocation.payload) {
                warn!(src, error = %e, "Script invoked an unavailable callback");
            }
        }
        Err(e) => {
            warn!(src, error = %e, "Script did not invoke a callback");
        }
    }
}

impl JsonpHost for HttpScriptHost {
    fn next_request_id(&self) -> RequestId {
        self.registry.next_id()
    }

    fn expose_connection(&self, id: RequestId, target: Arc<dyn CallbackTarget>) {
        self.registry.register(id, target);
    }

    fn remove_connection(&self, id: RequestId) {
        self.registry.unregister(id);
    }

    fn request_callback(&self, id: RequestId) -> String {
        self.registry.callback_name(id)
    }

    fn build(&self, url: &str) -> Arc<dyn ScriptElement> {
        let script = Arc::new(HttpScript::new(url));
        let element: Arc<dyn ScriptElement> = script.clone();
        self.scripts.insert(script_key(&element), script);
        element
    }

    fn send(&self, script: &Arc<dyn ScriptElement>) {
        let Some(script) = self
            .scripts
            .get(&script_key(script))
            .map(|entry| entry.value().clone())
        else {
            warn!(src = %script.src(), "Submitted script was not built by this host");
            return;
        };

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                script.dispatch(SignalEvent::Error(ScriptError::Other(format!(
                    "no async runtime available: {e}"
                ))));
                return;
            }
        };

        let registry = self.registry.clone();
        let loader = self.loader.clone();
        let task_script = script.clone();

        let task = runtime.spawn(async move {
            let event = match loader.load(&task_script.src).await {
                Ok(body) => {
                    evaluate(&registry, &task_script.src, &body);
                    SignalEvent::Load
                }
                Err(e) => SignalEvent::Error(e),
            };
            task_script.dispatch(event);
        });

        *lock(&script.task) = Some(task);
    }

    fn cleanup(&self, script: &Arc<dyn ScriptElement>) {
        if let Some((_, script)) = self.scripts.remove(&script_key(script)) {
            script.detach();
        }
    }
}
