//! In-process publish/subscribe between product modules.
//!
//! The bus is constructed once at startup and handed to every module that
//! publishes or subscribes; there is no global instance.
//!
//! ## Delivery semantics
//!
//! - **Snapshot iteration**: an emission delivers to the listeners registered
//!   at the moment it starts. Subscribing or unsubscribing concurrently never
//!   skips or duplicates another listener.
//! - **At most once per emission**: each listener observes each emission at
//!   most once; `once` listeners are removed from the registry when the
//!   snapshot is taken, before their handler body runs.
//! - **Failure isolation**: a handler that returns an error or panics is logged
//!   and reported in the [`EmitReport`]; siblings still run and the emitter
//!   never fails.
//! - **No persistence, no retry**: lost on restart, by contract.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::join_all;
use serde::Serialize;

use crate::handler::{SharedHandler, handler_identity};
use crate::Event;

/// Returned by `subscribe`/`once`; can be used to remove exactly that registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    event_name: String,
    id: u64,
}

impl SubscriptionHandle {
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// One isolated handler failure within an emission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerFailure {
    pub event_name: String,
    pub listener_id: u64,
    pub error: String,
    pub panicked: bool,
}

/// Outcome of one emission once every handler has settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmitReport {
    pub event_name: String,
    pub invoked: usize,
    pub failures: Vec<ListenerFailure>,
}

impl EmitReport {
    pub fn succeeded(&self) -> usize {
        self.invoked - self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Clone)]
struct Listener {
    id: u64,
    handler: SharedHandler,
    once: bool,
}

/// Process-wide event bus (explicitly constructed, shared via `Arc`).
pub struct EventBus {
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
    next_id: AtomicU64,
}

impl core::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let counts: HashMap<String, usize> = self
            .registry()
            .iter()
            .map(|(name, ls)| (name.clone(), ls.len()))
            .collect();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    // Critical sections never panic, so a poisoned lock still holds a consistent map.
    fn registry(&self) -> MutexGuard<'_, HashMap<String, Vec<Listener>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, event_name: &str, handler: SharedHandler, once: bool) -> SubscriptionHandle {
        let mut registry = self.registry();
        let listeners = registry.entry(event_name.to_string()).or_default();

        let identity = handler_identity(&handler);
        if let Some(existing) = listeners.iter().find(|l| handler_identity(&l.handler) == identity) {
            if existing.once != once {
                tracing::debug!(
                    event = event_name,
                    listener_id = existing.id,
                    once = existing.once,
                    "handler already registered; keeping existing registration"
                );
            }
            return SubscriptionHandle {
                event_name: event_name.to_string(),
                id: existing.id,
            };
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        listeners.push(Listener { id, handler, once });
        tracing::debug!(event = event_name, listener_id = id, once, "listener registered");

        SubscriptionHandle {
            event_name: event_name.to_string(),
            id,
        }
    }

    /// Register `handler` for `event_name`. Registering the same handler
    /// again for the same name is a no-op that returns the original handle.
    pub fn subscribe(&self, event_name: &str, handler: SharedHandler) -> SubscriptionHandle {
        self.register(event_name, handler, false)
    }

    /// Register `handler` for the next emission of `event_name` only.
    ///
    /// The first registration of a handler under a name wins: `once` on a
    /// handler already subscribed persistently returns that handle and the
    /// listener stays persistent, and `subscribe` on a pending `once` handler
    /// leaves it one-shot. Unsubscribe first to change the mode.
    pub fn once(&self, event_name: &str, handler: SharedHandler) -> SubscriptionHandle {
        self.register(event_name, handler, true)
    }

    /// Remove `handler` from `event_name`. Returns whether anything was removed.
    pub fn unsubscribe(&self, event_name: &str, handler: &SharedHandler) -> bool {
        let identity = handler_identity(handler);
        self.remove_where(event_name, |l| handler_identity(&l.handler) == identity)
    }

    pub fn unsubscribe_handle(&self, handle: &SubscriptionHandle) -> bool {
        self.remove_where(&handle.event_name, |l| l.id == handle.id)
    }

    fn remove_where(&self, event_name: &str, pred: impl Fn(&Listener) -> bool) -> bool {
        let mut registry = self.registry();
        let Some(listeners) = registry.get_mut(event_name) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|l| !pred(l));
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            registry.remove(event_name);
        }
        removed
    }

    pub fn listener_count(&self, event_name: &str) -> usize {
        self.registry().get(event_name).map_or(0, Vec::len)
    }

    /// Event names that currently have at least one listener.
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry().keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop every listener of `event_name`. Returns how many were removed.
    pub fn clear_event(&self, event_name: &str) -> usize {
        self.registry().remove(event_name).map_or(0, |ls| ls.len())
    }

    pub fn clear_all(&self) {
        let mut registry = self.registry();
        let total: usize = registry.values().map(Vec::len).sum();
        registry.clear();
        tracing::debug!(removed = total, "event bus cleared");
    }

    /// Take the delivery snapshot for one emission and retire `once` listeners
    /// in the same critical section.
    fn snapshot(&self, event_name: &str) -> Vec<Listener> {
        let mut registry = self.registry();
        let Some(listeners) = registry.get_mut(event_name) else {
            return Vec::new();
        };
        let snapshot = listeners.clone();
        listeners.retain(|l| !l.once);
        if listeners.is_empty() {
            registry.remove(event_name);
        }
        snapshot
    }

    /// Deliver to every listener concurrently and wait until all have settled.
    pub async fn emit(&self, event_name: &str, payload: serde_json::Value) -> EmitReport {
        self.publish(Event::new(event_name, payload)).await
    }

    /// Like [`EventBus::emit`] for an already-built event.
    pub async fn publish(&self, event: Event) -> EmitReport {
        let listeners = self.snapshot(event.name());
        let event_name = event.name().to_string();
        if listeners.is_empty() {
            tracing::trace!(event = %event_name, "no listeners");
            return EmitReport {
                event_name,
                invoked: 0,
                failures: Vec::new(),
            };
        }

        let invoked = listeners.len();
        let outcomes = join_all(
            listeners
                .into_iter()
                .map(|l| invoke(l.id, l.handler, event.clone())),
        )
        .await;

        EmitReport {
            event_name,
            invoked,
            failures: outcomes.into_iter().filter_map(Result::err).collect(),
        }
    }

    /// Fire and forget: returns immediately; listeners run one after another
    /// in registration order on a spawned task.
    ///
    /// The snapshot is taken before this returns. Must be called from within a
    /// Tokio runtime; the returned handle may be awaited or dropped.
    pub fn emit_immediate(&self, event_name: &str, payload: serde_json::Value) -> tokio::task::JoinHandle<EmitReport> {
        let event = Event::new(event_name, payload);
        let listeners = self.snapshot(event.name());

        tokio::spawn(async move {
            let mut failures = Vec::new();
            let invoked = listeners.len();
            for l in listeners {
                if let Err(failure) = invoke(l.id, l.handler, event.clone()).await {
                    failures.push(failure);
                }
            }
            EmitReport {
                event_name: event.name().to_string(),
                invoked,
                failures,
            }
        })
    }
}

async fn invoke(listener_id: u64, handler: SharedHandler, event: Event) -> Result<(), ListenerFailure> {
    let event_name = event.name().to_string();
    match AssertUnwindSafe(handler.handle(event)).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => {
            tracing::warn!(event = %event_name, listener_id, error = %format!("{err:#}"), "listener failed");
            Err(ListenerFailure {
                event_name,
                listener_id,
                error: format!("{err:#}"),
                panicked: false,
            })
        }
        Err(panic) => {
            let error = panic_message(panic.as_ref());
            tracing::warn!(event = %event_name, listener_id, error = %error, "listener panicked");
            Err(ListenerFailure {
                event_name,
                listener_id,
                error,
                panicked: true,
            })
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
