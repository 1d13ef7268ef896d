use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::debug;

use super::{CallbackTarget, RequestId};

pub const DEFAULT_NAMESPACE: &str = "__jsonp__";

const CALLBACK_SUFFIX: &str = ".finished";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("not a callback of namespace '{namespace}': {name}")]
    UnknownCallback { namespace: String, name: String },

    #[error("no connection registered as {0}")]
    NotFound(RequestId),
}

/// Process-wide map from request id to the connection waiting on it.
///
/// Callback names have the form `<namespace>.__req<n>.finished`, which is
/// what injected scripts are told to call.
pub struct CallbackRegistry {
    namespace: String,
    next_id: AtomicU64,
    targets: DashMap<RequestId, Arc<dyn CallbackTarget>>,
}

impl CallbackRegistry {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            next_id: AtomicU64::new(0),
            targets: DashMap::new(),
        }
    }

    pub fn next_id(&self) -> RequestId {
        RequestId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn register(&self, id: RequestId, target: Arc<dyn CallbackTarget>) {
        debug!(%id, "Connection exposed");
        self.targets.insert(id, target);
    }

    pub fn unregister(&self, id: RequestId) -> bool {
        let removed = self.targets.remove(&id).is_some();
        debug!(%id, removed, "Connection removed");
        removed
    }

    pub fn lookup(&self, id: RequestId) -> Option<Arc<dyn CallbackTarget>> {
        self.targets.get(&id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.targets.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn callback_name(&self, id: RequestId) -> String {
        format!("{}.{}{}", self.namespace, id, CALLBACK_SUFFIX)
    }

    /// Inverse of [`callback_name`](Self::callback_name)
    pub fn parse_callback(&self, name: &str) -> Option<RequestId> {
        let digits = name
            .strip_prefix(self.namespace.as_str())?
            .strip_prefix(".__req")?
            .strip_suffix(CALLBACK_SUFFIX)?;

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(RequestId)
    }

    /// Route a callback invocation to the registered connection.
    ///
    /// The map guard is released before the target runs; targets unregister
    /// themselves while handling a delivery.
    pub fn deliver(&self, name: &str, payload: Option<Value>) -> Result<(), RegistryError> {
        let id = self
            .parse_callback(name)
            .ok_or_else(|| RegistryError::UnknownCallback {
                namespace: self.namespace.clone(),
                name: name.to_string(),
            })?;

        let target = self.lookup(id).ok_or(RegistryError::NotFound(id))?;
        target.deliver(payload);
        Ok(())
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}
