//! Host document abstraction for JSONP script injection
//!
//! A JSONP fetch needs four things from its environment: a place to expose
//! the connection under a callback name, an element that loads a script
//! from a URL, a way to submit that element, and a way to dispose of it.
//! [`JsonpHost`] bundles those operations so the connection state machine
//! never touches a concrete document.
//!
//! ## Implementations
//!
//! - [`native::HttpScriptHost`] - fetches the script over HTTP and evaluates
//!   the JSONP envelope in-process
//! - [`mock::RecordingHost`] - records every call; signals are fired by hand

pub mod envelope;
pub mod mock;
pub mod native;
pub mod registry;

use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

pub use registry::{CallbackRegistry, RegistryError};

/// Identifier under which a connection is reachable by injected code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "__req{}", self.0)
    }
}

/// Error reported by an injected element's error signal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("script request failed: {0}")]
    RequestFailed(String),

    #[error("script request returned HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("invalid script url: {0}")]
    InvalidUrl(String),

    #[error("script body exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("{0}")]
    Other(String),
}

/// Completion signals an injected element dispatches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Load,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalEvent {
    Load,
    Error(ScriptError),
}

impl SignalEvent {
    pub fn signal(&self) -> Signal {
        match self {
            SignalEvent::Load => Signal::Load,
            SignalEvent::Error(_) => Signal::Error,
        }
    }
}

pub type Listener = Arc<dyn Fn(&SignalEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Receiver of an external delivery (the injected script calling back)
pub trait CallbackTarget: Send + Sync {
    fn deliver(&self, payload: Option<Value>);
}

/// Opaque injected element
pub trait ScriptElement: Send + Sync {
    /// Locator the element loads
    fn src(&self) -> String;

    fn add_listener(&self, signal: Signal, listener: Listener) -> ListenerId;

    fn remove_listener(&self, signal: Signal, id: ListenerId);
}

/// Host document operations consumed by a JSONP connection
pub trait JsonpHost: Send + Sync {
    /// Allocate an identifier, unique per call
    fn next_request_id(&self) -> RequestId;

    /// Make `target` reachable by injected code under `id`
    fn expose_connection(&self, id: RequestId, target: Arc<dyn CallbackTarget>);

    fn remove_connection(&self, id: RequestId);

    /// Name injected code must call to reach the connection exposed as `id`
    fn request_callback(&self, id: RequestId) -> String;

    /// Build an inert, unattached element that will load `url`
    fn build(&self, url: &str) -> Arc<dyn ScriptElement>;

    /// Attach the element, starting the load
    fn send(&self, script: &Arc<dyn ScriptElement>);

    /// Detach and dispose of the element
    fn cleanup(&self, script: &Arc<dyn ScriptElement>);
}

/// Lock a mutex, recovering the data if a panicking holder poisoned it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Listener bookkeeping shared by element implementations
#[derive(Default)]
pub struct ListenerSet {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Signal, Listener)>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, signal: Signal, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.listeners).push((id, signal, listener));
        id
    }

    pub fn remove(&self, signal: Signal, id: ListenerId) {
        lock(&self.listeners).retain(|(lid, s, _)| !(*lid == id && *s == signal));
    }

    pub fn count(&self, signal: Signal) -> usize {
        lock(&self.listeners)
            .iter()
            .filter(|(_, s, _)| *s == signal)
            .count()
    }

    /// Invoke every listener for the event's signal.
    ///
    /// Listeners run without the internal lock held, so they may add or
    /// remove listeners on the same set.
    pub fn dispatch(&self, event: &SignalEvent) -> usize {
        let signal = event.signal();
        let matching: Vec<Listener> = lock(&self.listeners)
            .iter()
            .filter(|(_, s, _)| *s == signal)
            .map(|(_, _, l)| l.clone())
            .collect();

        for listener in &matching {
            listener(event);
        }
        matching.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_listener_set_dispatches_by_signal() {
        let set = ListenerSet::new();
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        set.add(
            Signal::Load,
            Arc::new(move |_: &SignalEvent| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        set.add(Signal::Error, Arc::new(|_: &SignalEvent| panic!("error listener fired")));

        assert_eq!(set.dispatch(&SignalEvent::Load), 1);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_can_remove_itself_during_dispatch() {
        let set = Arc::new(ListenerSet::new());
        let id_slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

        let set_ref = set.clone();
        let slot = id_slot.clone();
        let id = set.add(
            Signal::Load,
            Arc::new(move |_: &SignalEvent| {
                if let Some(id) = *slot.lock().unwrap() {
                    set_ref.remove(Signal::Load, id);
                }
            }),
        );
        *id_slot.lock().unwrap() = Some(id);

        set.dispatch(&SignalEvent::Load);
        assert_eq!(set.count(Signal::Load), 0);
    }

    #[test]
    fn test_remove_requires_matching_signal() {
        let set = ListenerSet::new();
        let id = set.add(Signal::Load, Arc::new(|_: &SignalEvent| {}));
        set.remove(Signal::Error, id);
        assert_eq!(set.count(Signal::Load), 1);
        set.remove(Signal::Load, id);
        assert_eq!(set.count(Signal::Load), 0);
    }

    #[test]
    fn test_request_id_display() {
        assert_eq!(RequestId(4).to_string(), "__req4");
    }
}
