//! Event bus - the synchronous pub/sub backbone.
//!
//! Widgets announce changes here without holding references to each other;
//! the derived-rule engine and persistence coordinator subscribe. Dispatch is
//! synchronous and priority-ordered (descending, registration order on
//! ties). A listener failure is routed to the error sink and never prevents
//! the remaining listeners from running. A bounded ring buffer keeps the
//! most recent emissions for diagnostics, and an optional parent scope
//! receives forwarded events exactly once (propagation is forced off on the
//! forwarded copy, so scopes cannot loop).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use sheetbldr_domain::{ComponentId, SheetEvent};

use crate::error::HandlerError;

/// A dispatched event as listeners see it.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub event_type: String,
    pub payload: SheetEvent,
    pub source: Option<ComponentId>,
    pub priority: i32,
    pub timestamp: DateTime<Utc>,
}

/// A recorded emission in the diagnostic ring buffer.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub event_type: String,
    pub payload: SheetEvent,
    pub source: Option<ComponentId>,
    pub priority: i32,
    pub timestamp: DateTime<Utc>,
}

/// Listener callback. Errors go to the error sink, not the emitter.
pub type Handler = Arc<dyn Fn(&EventEnvelope) -> Result<(), HandlerError> + Send + Sync>;

/// Central sink for listener failures.
pub type ErrorSink = Arc<dyn Fn(&str, &HandlerError) + Send + Sync>;

/// Options for `on`/`once`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscribeOptions {
    /// Higher priorities run first.
    pub priority: i32,
    /// Component owning this listener, for targeted cleanup.
    pub component: Option<ComponentId>,
}

/// Options for `emit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmitOptions {
    pub source: Option<ComponentId>,
    pub priority: i32,
    /// Forward this event once to the parent scope after local dispatch.
    pub propagate: bool,
}

/// Token returned by `on`/`once`; pass to `off` to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerId {
    event_type: String,
    id: u64,
}

struct Listener {
    id: u64,
    priority: i32,
    component: Option<ComponentId>,
    /// Set once a `once` listener has fired; cleared from the table after
    /// dispatch. Plain listeners never set it.
    fired: Option<Arc<AtomicBool>>,
    handler: Handler,
}

/// The synchronous, priority-ordered pub/sub bus.
pub struct EventBus {
    listeners: RwLock<HashMap<String, Vec<Listener>>>,
    next_id: AtomicU64,
    history: Mutex<VecDeque<EventRecord>>,
    history_capacity: usize,
    error_sink: RwLock<Option<ErrorSink>>,
    parent: RwLock<Option<Arc<EventBus>>>,
}

impl EventBus {
    pub fn new(history_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            error_sink: RwLock::new(None),
            parent: RwLock::new(None),
        })
    }

    /// Register a listener. Returns a token for `off`.
    pub fn on(
        &self,
        event_type: &str,
        options: SubscribeOptions,
        handler: Handler,
    ) -> ListenerId {
        self.register(event_type, options, handler, false)
    }

    /// Register a listener that is removed after its first invocation.
    pub fn once(
        &self,
        event_type: &str,
        options: SubscribeOptions,
        handler: Handler,
    ) -> ListenerId {
        self.register(event_type, options, handler, true)
    }

    fn register(
        &self,
        event_type: &str,
        options: SubscribeOptions,
        handler: Handler,
        once: bool,
    ) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let listener = Listener {
            id,
            priority: options.priority,
            component: options.component,
            fired: once.then(|| Arc::new(AtomicBool::new(false))),
            handler,
        };
        let mut table = write_lock(&self.listeners);
        table
            .entry(event_type.to_string())
            .or_default()
            .push(listener);
        ListenerId {
            event_type: event_type.to_string(),
            id,
        }
    }

    /// Remove a listener. Returns false when it was already gone.
    pub fn off(&self, token: &ListenerId) -> bool {
        let mut table = write_lock(&self.listeners);
        if let Some(listeners) = table.get_mut(&token.event_type) {
            let before = listeners.len();
            listeners.retain(|l| l.id != token.id);
            return listeners.len() < before;
        }
        false
    }

    /// Remove every listener registered under `component`.
    pub fn off_component(&self, component: ComponentId) {
        let mut table = write_lock(&self.listeners);
        for listeners in table.values_mut() {
            listeners.retain(|l| l.component != Some(component));
        }
    }

    /// Route listener failures somewhere central (a log panel, telemetry).
    pub fn set_error_sink(&self, sink: ErrorSink) {
        *write_lock(&self.error_sink) = Some(sink);
    }

    /// Attach a parent scope that receives `propagate: true` events once.
    pub fn set_parent(&self, parent: Arc<EventBus>) {
        *write_lock(&self.parent) = Some(parent);
    }

    /// Emit an event: record it, run local listeners in descending-priority
    /// order, then optionally forward one copy to the parent scope.
    pub fn emit(&self, event_type: &str, payload: SheetEvent, options: EmitOptions) {
        let envelope = EventEnvelope {
            event_type: event_type.to_string(),
            payload,
            source: options.source,
            priority: options.priority,
            timestamp: Utc::now(),
        };
        self.record(&envelope);
        self.dispatch(&envelope);

        if options.propagate {
            let parent = read_lock(&self.parent).clone();
            if let Some(parent) = parent {
                // Propagation is forced off on the forwarded copy.
                parent.emit(
                    event_type,
                    envelope.payload.clone(),
                    EmitOptions {
                        source: options.source,
                        priority: options.priority,
                        propagate: false,
                    },
                );
            }
        }
    }

    fn record(&self, envelope: &EventEnvelope) {
        let mut history = lock(&self.history);
        if history.len() == self.history_capacity {
            history.pop_front();
        }
        history.push_back(EventRecord {
            event_type: envelope.event_type.clone(),
            payload: envelope.payload.clone(),
            source: envelope.source,
            priority: envelope.priority,
            timestamp: envelope.timestamp,
        });
    }

    fn dispatch(&self, envelope: &EventEnvelope) {
        // Snapshot matching listeners so no lock is held while handlers run;
        // handlers may re-enter the bus (subscribe, emit) freely.
        let mut snapshot: Vec<(u64, i32, Option<Arc<AtomicBool>>, Handler)> = {
            let table = read_lock(&self.listeners);
            match table.get(&envelope.event_type) {
                Some(listeners) => listeners
                    .iter()
                    .map(|l| (l.id, l.priority, l.fired.clone(), l.handler.clone()))
                    .collect(),
                None => return,
            }
        };
        // Stable sort keeps registration order for equal priorities.
        snapshot.sort_by_key(|(_, priority, _, _)| std::cmp::Reverse(*priority));

        let mut spent = Vec::new();
        for (id, _, fired, handler) in snapshot {
            if let Some(fired) = fired {
                // `once` semantics survive reentrant emits: first swap wins.
                if fired.swap(true, Ordering::SeqCst) {
                    continue;
                }
                spent.push(id);
            }
            if let Err(err) = handler(envelope) {
                self.report(&envelope.event_type, &err);
            }
        }

        if !spent.is_empty() {
            let mut table = write_lock(&self.listeners);
            if let Some(listeners) = table.get_mut(&envelope.event_type) {
                listeners.retain(|l| !spent.contains(&l.id));
            }
        }
    }

    fn report(&self, event_type: &str, err: &HandlerError) {
        tracing::warn!(event = event_type, error = %err, "event listener failed");
        let sink = read_lock(&self.error_sink).clone();
        if let Some(sink) = sink {
            sink(event_type, err);
        }
    }

    /// The most recent emissions, oldest first.
    pub fn recent(&self) -> Vec<EventRecord> {
        lock(&self.history).iter().cloned().collect()
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        read_lock(&self.listeners)
            .get(event_type)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

// Lock helpers that recover from poisoning: a panicking listener must not
// take the whole bus down with it.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
