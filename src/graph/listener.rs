//! Synchronous observer registry for graph change sets.

use super::mutation::ChangeSet;
use super::store::GraphStore;
use std::fmt;

/// Handle returned by [`ListenerRegistry::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Receives every committed change set.
///
/// Listeners only get a shared reference to the store: they observe, they
/// cannot mutate. All listeners have returned before the mutating call that
/// triggered them returns.
pub trait GraphListener {
    fn on_change(&mut self, graph: &GraphStore, change: &ChangeSet);
}

/// A derived observer found an identifier it cannot reconcile with the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyFault {
    /// Which observer detected the fault (e.g. `"nodes list"`).
    pub observer: &'static str,
    pub message: String,
}

impl ConsistencyFault {
    pub fn new(observer: &'static str, message: impl Into<String>) -> Self {
        Self {
            observer,
            message: message.into(),
        }
    }
}

impl fmt::Display for ConsistencyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.observer, self.message)
    }
}

/// Registered listeners, notified in registration order.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Vec<(ListenerId, Box<dyn GraphListener>)>,
    next_id: u64,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl ListenerRegistry {
    pub fn subscribe(&mut self, listener: Box<dyn GraphListener>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Returns false if the id was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn dispatch(&mut self, graph: &GraphStore, change: &ChangeSet) {
        for (id, listener) in &mut self.listeners {
            log::trace!("dispatching {} mutation(s) to listener {:?}", change.len(), id);
            listener.on_change(graph, change);
        }
    }
}
