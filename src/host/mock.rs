//! Recording host for tests and development
//!
//! Nothing is loaded. Tests drive a fetch by calling
//! [`RecordingHost::deliver`] and [`MockScript::fire`] in whatever order the
//! scenario needs, then inspect the call counters.

use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{
    CallbackRegistry, CallbackTarget, JsonpHost, Listener, ListenerId, ListenerSet, RequestId,
    ScriptElement, Signal, SignalEvent, lock,
};

/// Element that only dispatches when told to
#[derive(Default)]
pub struct MockScript {
    src: String,
    listeners: ListenerSet,
}

impl MockScript {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            listeners: ListenerSet::new(),
        }
    }

    /// Dispatch `event` to the attached listeners, returns how many ran
    pub fn fire(&self, event: SignalEvent) -> usize {
        self.listeners.dispatch(&event)
    }

    pub fn listener_count(&self, signal: Signal) -> usize {
        self.listeners.count(signal)
    }
}

impl ScriptElement for MockScript {
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

/// Snapshot of how often each host operation ran
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostCalls {
    pub exposed: usize,
    pub removed: usize,
    pub built: usize,
    pub sent: usize,
    pub cleaned_up: usize,
}

/// Host double that records calls and keeps every built element
#[derive(Default)]
pub struct RecordingHost {
    registry: CallbackRegistry,
    scripts: Mutex<Vec<Arc<MockScript>>>,
    exposed: AtomicUsize,
    removed: AtomicUsize,
    built: AtomicUsize,
    sent: AtomicUsize,
    cleaned_up: AtomicUsize,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> HostCalls {
        HostCalls {
            exposed: self.exposed.load(Ordering::SeqCst),
            removed: self.removed.load(Ordering::SeqCst),
            built: self.built.load(Ordering::SeqCst),
            sent: self.sent.load(Ordering::SeqCst),
            cleaned_up: self.cleaned_up.load(Ordering::SeqCst),
        }
    }

    pub fn registry(&self) -> &CallbackRegistry {
        &self.registry
    }

    /// Most recently built element
    pub fn last_script(&self) -> Option<Arc<MockScript>> {
        lock(&self.scripts).last().cloned()
    }

    /// Invoke the callback the way an injected script would
    pub fn deliver(&self, id: RequestId, payload: Option<Value>) -> bool {
        self.registry
            .deliver(&self.registry.callback_name(id), payload)
            .is_ok()
    }
}

impl JsonpHost for RecordingHost {
    fn next_request_id(&self) -> RequestId {
        self.registry.next_id()
    }

    fn expose_connection(&self, id: RequestId, target: Arc<dyn CallbackTarget>) {
        self.exposed.fetch_add(1, Ordering::SeqCst);
        self.registry.register(id, target);
    }

    fn remove_connection(&self, id: RequestId) {
        self.removed.fetch_add(1, Ordering::SeqCst);
        self.registry.unregister(id);
    }

    fn request_callback(&self, id: RequestId) -> String {
        self.registry.callback_name(id)
    }

    fn build(&self, url: &str) -> Arc<dyn ScriptElement> {
        self.built.fetch_add(1, Ordering::SeqCst);
        let script = Arc::new(MockScript::new(url));
        lock(&self.scripts).push(script.clone());
        script
    }

    fn send(&self, _script: &Arc<dyn ScriptElement>) {
        self.sent.fetch_add(1, Ordering::SeqCst);
    }

    fn cleanup(&self, _script: &Arc<dyn ScriptElement>) {
        self.cleaned_up.fetch_add(1, Ordering::SeqCst);
    }
}
