//! Publish/subscribe for client events.
//!
//! Handlers are registered per [`EventKind`] and called synchronously, in
//! registration order, from whichever task emits. Emission happens before
//! the emitting operation returns, so a handler always sees the new state.
//!
//! For async consumers, [`EventEmitter::subscribe`] adapts the same
//! registry into an unbounded channel carrying every event.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::session::Session;

/// Events published by a [`SenseClient`](crate::SenseClient).
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The session was replaced or cleared.
    ///
    /// Fired exactly once per actual change. Callers persist the session
    /// from here.
    SessionChanged(Option<Session>),

    /// A message arrived on the realtime feed.
    RealtimeUpdate {
        monitor_id: u64,
        payload: serde_json::Value,
    },
}

impl ClientEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ClientEvent::SessionChanged(_) => EventKind::SessionChanged,
            ClientEvent::RealtimeUpdate { .. } => EventKind::RealtimeUpdate,
        }
    }
}

/// Key under which handlers are registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SessionChanged,
    RealtimeUpdate,
}

/// Identifies a registered handler for [`EventEmitter::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

enum Target {
    Handler {
        kind: EventKind,
        once: bool,
        handler: Handler,
    },
    // Receives every kind
    Channel(mpsc::UnboundedSender<ClientEvent>),
}

struct Listener {
    id: ListenerId,
    target: Target,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<Listener>,
}

impl Registry {
    fn add(&mut self, target: Target) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.push(Listener { id, target });
        id
    }
}

/// Registry of event handlers.
#[derive(Default)]
pub struct EventEmitter {
    registry: Mutex<Registry>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `handler` for every event of `kind`.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.registry.lock().add(Target::Handler {
            kind,
            once: false,
            handler: Arc::new(handler),
        })
    }

    /// Call `handler` for the next event of `kind` only.
    pub fn once<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.registry.lock().add(Target::Handler {
            kind,
            once: true,
            handler: Arc::new(handler),
        })
    }

    /// Remove a handler or subscription. Returns false if it was not
    /// registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut registry = self.registry.lock();
        let before = registry.listeners.len();
        registry.listeners.retain(|l| l.id != id);
        registry.listeners.len() != before
    }

    /// Number of handlers and live subscriptions that would see an event
    /// of `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registry
            .lock()
            .listeners
            .iter()
            .filter(|l| match &l.target {
                Target::Handler { kind: k, .. } => *k == kind,
                Target::Channel(tx) => !tx.is_closed(),
            })
            .count()
    }

    /// Deliver every event into a channel.
    ///
    /// The subscription is dropped on the first emit after the receiver
    /// goes away.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ClientEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.registry.lock().add(Target::Channel(tx));
        rx
    }

    /// Deliver `event` to everything registered for its kind.
    pub fn emit(&self, event: &ClientEvent) {
        let kind = event.kind();
        let mut handlers: Vec<Handler> = Vec::new();
        {
            let mut registry = self.registry.lock();
            registry.listeners.retain(|l| match &l.target {
                Target::Handler {
                    kind: k,
                    once,
                    handler,
                } => {
                    if *k != kind {
                        return true;
                    }
                    handlers.push(handler.clone());
                    !once
                }
                Target::Channel(tx) => tx.send(event.clone()).is_ok(),
            });
        }

        // Outside the lock so handlers can register and unregister.
        for handler in handlers {
            handler(event);
        }
    }
}
