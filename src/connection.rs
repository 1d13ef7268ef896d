//! JSONP connection: one request, one injected script, one result
//!
//! ## Lifecycle
//!
//! ```text
//! Unsent --subscribe--> Loading --load/error--> Done
//!                          |
//!                          +--drop subscription--> Cancelled
//! ```
//!
//! Nothing touches the host until [`JsonpConnection::subscribe`] is called.
//! Whichever terminal transition happens first detaches both listeners,
//! disposes of the script and removes the registry entry; later signals
//! find the connection terminal and are dropped.
//!
//! Host operations are never called with the state lock held: a host may
//! dispatch a signal synchronously from `send` or `cleanup`.

use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{JsonpError, Result};
use crate::host::{
    CallbackTarget, JsonpHost, ListenerId, RequestId, ScriptElement, ScriptError, Signal,
    SignalEvent, lock,
};
use crate::locator;
use crate::observability::Metrics;
use crate::request::{ReadyState, Request, RequestMethod};
use crate::response::{Response, ResponseOptions};

type Outcome = Result<Response>;

struct State {
    ready_state: ReadyState,
    id: Option<RequestId>,
    /// Registry entry still present
    registered: bool,
    finished: bool,
    payload: Option<Value>,
    script: Option<Arc<dyn ScriptElement>>,
    listeners: Option<(ListenerId, ListenerId)>,
    observer: Option<oneshot::Sender<Outcome>>,
}

/// Everything a terminal transition has to release, taken out of the lock
struct Teardown {
    script: Option<Arc<dyn ScriptElement>>,
    listeners: Option<(ListenerId, ListenerId)>,
    unregister: Option<RequestId>,
}

impl State {
    fn take_teardown(&mut self) -> Teardown {
        let unregister = if self.registered {
            self.registered = false;
            self.id
        } else {
            None
        };
        Teardown {
            script: self.script.take(),
            listeners: self.listeners.take(),
            unregister,
        }
    }
}

struct Shared {
    request: Request,
    host: Arc<dyn JsonpHost>,
    base_response_options: Option<ResponseOptions>,
    metrics: Arc<Metrics>,
    state: Mutex<State>,
}

impl Shared {
    fn release(&self, teardown: Teardown) {
        if let Some(script) = &teardown.script {
            if let Some((load, error)) = teardown.listeners {
                script.remove_listener(Signal::Load, load);
                script.remove_listener(Signal::Error, error);
            }
            self.host.cleanup(script);
        }
        if let Some(id) = teardown.unregister {
            self.host.remove_connection(id);
        }
    }

    fn on_load(&self) {
        let (teardown, observer, delivered) = {
            let mut state = lock(&self.state);
            if state.ready_state != ReadyState::Loading {
                debug!(state = ?state.ready_state, "Ignoring load signal");
                return;
            }
            state.ready_state = ReadyState::Done;
            let delivered = if state.finished {
                Some(state.payload.take())
            } else {
                None
            };
            (state.take_teardown(), state.observer.take(), delivered)
        };

        self.release(teardown);

        let outcome = match delivered {
            None => {
                self.metrics.fetch_failed();
                debug!(url = %self.request.url, "Script loaded without invoking callback");
                Err(JsonpError::CallbackNotInvoked)
            }
            Some(payload) => {
                let mut options = ResponseOptions::with_body(payload);
                if let Some(base) = &self.base_response_options {
                    options = base.merge(&options);
                }
                self.metrics.fetch_completed();
                debug!(url = %self.request.url, "JSONP fetch completed");
                Ok(Response::new(options))
            }
        };

        resolve(observer, outcome);
    }

    fn on_error(&self, error: ScriptError) {
        let (teardown, observer) = {
            let mut state = lock(&self.state);
            if state.ready_state != ReadyState::Loading {
                debug!(state = ?state.ready_state, "Ignoring error signal");
                return;
            }
            state.ready_state = ReadyState::Done;
            (state.take_teardown(), state.observer.take())
        };

        self.release(teardown);
        self.metrics.fetch_failed();
        debug!(url = %self.request.url, %error, "JSONP script failed");
        resolve(observer, Err(JsonpError::Script(error)));
    }

    fn cancel(&self) {
        let teardown = {
            let mut state = lock(&self.state);
            if state.ready_state != ReadyState::Loading {
                return;
            }
            state.ready_state = ReadyState::Cancelled;
            state.observer = None;
            state.take_teardown()
        };

        self.release(teardown);
        self.metrics.fetch_cancelled();
        debug!(url = %self.request.url, "JSONP fetch cancelled");
    }
}

impl CallbackTarget for Shared {
    fn deliver(&self, payload: Option<Value>) {
        let unregister = {
            let mut state = lock(&self.state);
            if state.ready_state == ReadyState::Unsent {
                warn!(url = %self.request.url, "Ignoring callback invocation before fetch started");
                return;
            }
            if state.finished {
                warn!(url = %self.request.url, "Ignoring repeated callback invocation");
                return;
            }
            state.finished = true;

            let unregister = if state.registered {
                state.registered = false;
                state.id
            } else {
                None
            };

            if state.ready_state != ReadyState::Cancelled {
                state.payload = payload;
            }
            unregister
        };

        if let Some(id) = unregister {
            self.host.remove_connection(id);
        }
    }
}

fn resolve(observer: Option<oneshot::Sender<Outcome>>, outcome: Outcome) {
    if let Some(observer) = observer {
        // A closed receiver means the subscriber is being dropped concurrently
        let _ = observer.send(outcome);
    }
}

/// A single JSONP fetch.
///
/// Created by [`JsonpBackend`](crate::backend::JsonpBackend); the request
/// method must be GET. Call [`subscribe`](Self::subscribe) once to start the
/// fetch and await the result.
pub struct JsonpConnection {
    shared: Arc<Shared>,
}

impl JsonpConnection {
    pub fn new(
        request: Request,
        host: Arc<dyn JsonpHost>,
        base_response_options: Option<ResponseOptions>,
    ) -> Result<Self> {
        Self::with_metrics(request, host, base_response_options, Arc::new(Metrics::new()))
    }

    pub fn with_metrics(
        request: Request,
        host: Arc<dyn JsonpHost>,
        base_response_options: Option<ResponseOptions>,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        if request.method != RequestMethod::Get {
            return Err(JsonpError::InvalidMethod(request.method));
        }

        Ok(Self {
            shared: Arc::new(Shared {
                request,
                host,
                base_response_options,
                metrics,
                state: Mutex::new(State {
                    ready_state: ReadyState::Unsent,
                    id: None,
                    registered: false,
                    finished: false,
                    payload: None,
                    script: None,
                    listeners: None,
                    observer: None,
                }),
            }),
        })
    }

    pub fn request(&self) -> &Request {
        &self.shared.request
    }

    pub fn ready_state(&self) -> ReadyState {
        lock(&self.shared.state).ready_state
    }

    /// Registry id, assigned when the fetch starts
    pub fn id(&self) -> Option<RequestId> {
        lock(&self.shared.state).id
    }

    /// Entry point for the injected script's callback
    pub fn deliver(&self, payload: Option<Value>) {
        self.shared.deliver(payload);
    }

    /// Start the fetch.
    ///
    /// Exposes the connection to the host, injects the script and returns a
    /// future for the single result. Only one subscription is allowed.
    pub fn subscribe(&self) -> Result<ResponseSubscription> {
        let shared = &self.shared;
        let host = &shared.host;
        let (tx, rx) = oneshot::channel();

        {
            let mut state = lock(&shared.state);
            if state.ready_state != ReadyState::Unsent {
                return Err(JsonpError::AlreadySubscribed);
            }
            state.ready_state = ReadyState::Loading;
            state.observer = Some(tx);
        }
        shared.metrics.fetch_started();

        let id = host.next_request_id();
        {
            let mut state = lock(&shared.state);
            state.id = Some(id);
            state.registered = true;
        }

        let target: Arc<dyn CallbackTarget> = shared.clone();
        host.expose_connection(id, target);

        let callback = host.request_callback(id);
        if !locator::has_placeholder(&shared.request.url) {
            warn!(
                url = %shared.request.url,
                "URL has no {} placeholder, script cannot reach the connection",
                locator::CALLBACK_PLACEHOLDER
            );
        }
        let url = locator::rewrite(&shared.request.url, &callback);
        debug!(%id, %url, "Starting JSONP fetch");

        let script = host.build(&url);

        let weak: Weak<Shared> = Arc::downgrade(shared);
        let on_load = script.add_listener(
            Signal::Load,
            Arc::new(move |_event: &SignalEvent| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_load();
                }
            }),
        );

        let weak: Weak<Shared> = Arc::downgrade(shared);
        let on_error = script.add_listener(
            Signal::Error,
            Arc::new(move |event: &SignalEvent| {
                if let (Some(shared), SignalEvent::Error(error)) = (weak.upgrade(), event) {
                    shared.on_error(error.clone());
                }
            }),
        );

        {
            let mut state = lock(&shared.state);
            state.script = Some(script.clone());
            state.listeners = Some((on_load, on_error));
        }

        host.send(&script);

        Ok(ResponseSubscription {
            shared: shared.clone(),
            rx,
            settled: false,
        })
    }
}

/// Pending result of a subscribed connection.
///
/// Resolves once with the response or the error. Dropping it before it
/// resolves cancels the fetch.
pub struct ResponseSubscription {
    shared: Arc<Shared>,
    rx: oneshot::Receiver<Outcome>,
    settled: bool,
}

impl ResponseSubscription {
    /// Withdraw from the fetch, releasing the script and registry entry
    pub fn cancel(mut self) {
        self.shared.cancel();
        self.settled = true;
    }
}

impl Future for ResponseSubscription {
    type Output = Outcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(result) => {
                this.settled = true;
                Poll::Ready(result.unwrap_or(Err(JsonpError::Disconnected)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ResponseSubscription {
    fn drop(&mut self) {
        if !self.settled {
            self.shared.cancel();
        }
    }
}
