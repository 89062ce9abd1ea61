//! The graph model: canonical nodes/edges/connections, transactional
//! mutation and synchronous change notification.
//!
//! All writes are expressed as [`Mutation`]s. A transaction collects the
//! mutations of one logical action; committing it hands a single
//! [`ChangeSet`] to every registered listener. A failing step rolls back the
//! already-applied steps of the same operation before anything is dispatched,
//! so listeners never observe partial state.
//!
//! # Example
//!
//! ```rust
//! use scenegraph::graph::Graph;
//! use scenegraph::model::{NodeSpec, Point};
//!
//! let mut graph = Graph::new();
//! let a = graph.add_node(NodeSpec::new("A", Point::default()).with_output("out1")).unwrap();
//! let b = graph.add_node(NodeSpec::new("B", Point::default()).with_input("in1")).unwrap();
//! let out1 = graph.store().node(a).unwrap().port("out1").unwrap();
//! let in1 = graph.store().node(b).unwrap().port("in1").unwrap();
//! graph.add_edge(out1, in1).unwrap();
//!
//! let removed = graph.remove_node(a).unwrap();
//! assert_eq!(removed.name, "A");
//! assert_eq!(graph.store().edge_count(), 0);
//! ```

mod listener;
mod mutation;
mod store;

pub use listener::{ConsistencyFault, GraphListener, ListenerId, ListenerRegistry};
pub use mutation::{ChangeKind, ChangeSet, Mutation};
pub use store::GraphStore;

use crate::error::{GraphError, Result};
use crate::model::{
    AttrValue, Connection, ConnectionRef, Edge, EdgeId, ItemRef, Node, NodeId, NodeSpec, Point,
    PortId,
};

/// The graph model: store + open transaction journal + listeners.
#[derive(Debug, Default)]
pub struct Graph {
    store: GraphStore,
    /// Mutations applied by the currently open transaction, if any.
    journal: Option<Vec<Mutation>>,
    listeners: ListenerRegistry,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view of the current graph state.
    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    // ────────────────────────────────────────────────────────────────────────
    // Listeners
    // ────────────────────────────────────────────────────────────────────────

    pub fn subscribe(&mut self, listener: Box<dyn GraphListener>) -> ListenerId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Transactions
    // ────────────────────────────────────────────────────────────────────────

    pub fn in_transaction(&self) -> bool {
        self.journal.is_some()
    }

    /// Open a transaction. Mutations are applied immediately but only
    /// announced on commit. Nested transactions are rejected.
    pub fn begin_transaction(&mut self) -> Result<()> {
        if self.journal.is_some() {
            return Err(GraphError::ReentrantMutation);
        }
        self.journal = Some(Vec::new());
        Ok(())
    }

    /// Close the open transaction and notify every listener with its change set.
    /// An empty transaction commits silently.
    pub fn commit_transaction(&mut self) -> Result<ChangeSet> {
        let mutations = self.journal.take().ok_or(GraphError::TransactionNotOpen)?;
        let change = ChangeSet::new(mutations);
        if !change.is_empty() {
            log::debug!("graph commit: {} mutation(s)", change.len());
            self.listeners.dispatch(&self.store, &change);
        }
        Ok(change)
    }

    /// Undo every mutation of the open transaction and close it without
    /// notifying anyone.
    pub fn rollback_transaction(&mut self) -> Result<()> {
        if self.journal.is_none() {
            return Err(GraphError::TransactionNotOpen);
        }
        self.unwind_to(0);
        self.journal = None;
        Ok(())
    }

    fn journal_len(&self) -> usize {
        self.journal.as_ref().map_or(0, Vec::len)
    }

    /// Revert journaled mutations past `mark`, newest first.
    fn unwind_to(&mut self, mark: usize) {
        let Some(journal) = self.journal.as_mut() else {
            return;
        };
        while journal.len() > mark {
            let Some(m) = journal.pop() else { break };
            if let Err(err) = self.store.apply(&m.inverse()) {
                // The inverse of a just-applied mutation always applies; if it
                // does not, the store is already corrupt.
                log::error!("rollback of {:?} failed: {}", m.kind(), err);
            }
        }
    }

    /// Run `f` as one atomic unit. Joins the open transaction if there is
    /// one, otherwise opens and commits its own. On error everything `f`
    /// applied is reverted.
    fn atomic<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let owns_transaction = !self.in_transaction();
        if owns_transaction {
            self.begin_transaction()?;
        }
        let mark = self.journal_len();
        match f(self) {
            Ok(value) => {
                if owns_transaction {
                    self.commit_transaction()?;
                }
                Ok(value)
            }
            Err(err) => {
                self.unwind_to(mark);
                if owns_transaction {
                    self.journal = None;
                }
                Err(err)
            }
        }
    }

    /// Apply and journal a single mutation. Callers are inside `atomic`.
    fn record(&mut self, mutation: Mutation) -> Result<()> {
        self.store.apply(&mutation)?;
        if let Some(journal) = self.journal.as_mut() {
            journal.push(mutation);
        }
        Ok(())
    }

    // ────────────────────────────────────────────────────────────────────────
    // Mutations
    // ────────────────────────────────────────────────────────────────────────

    /// Replay one primitive mutation.
    pub fn apply(&mut self, mutation: &Mutation) -> Result<()> {
        self.atomic(|g| g.record(mutation.clone()))
    }

    /// Replay a sequence of mutations atomically.
    pub fn apply_all<'a>(
        &mut self,
        mutations: impl IntoIterator<Item = &'a Mutation>,
    ) -> Result<()> {
        self.atomic(|g| {
            for m in mutations {
                g.record(m.clone())?;
            }
            Ok(())
        })
    }

    /// Create a node from `spec`; ports get ids in declaration order.
    pub fn add_node(&mut self, spec: NodeSpec) -> Result<NodeId> {
        self.atomic(|g| {
            let id = g.store.allocate_node_id();
            let connections = spec
                .ports
                .into_iter()
                .enumerate()
                .map(|(i, p)| Connection {
                    id: PortId(i as u32),
                    name: p.name,
                    direction: p.direction,
                })
                .collect();
            let node = Node {
                id,
                name: spec.name,
                position: spec.position,
                attributes: spec.attributes,
                connections,
            };
            g.insert_node(node)?;
            Ok(id)
        })
    }

    /// Insert a fully formed node, keeping its id. Appends to display order.
    pub fn insert_node(&mut self, node: Node) -> Result<()> {
        self.atomic(|g| {
            let index = g.store.node_count();
            g.record(Mutation::AddNode { index, node })
        })
    }

    /// Delete a node and every edge touching it, as one change set.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node> {
        self.atomic(|g| {
            if !g.store.contains_node(id) {
                return Err(GraphError::NotFound(ItemRef::Node(id)));
            }
            for edge in g.store.edges_of_node(id) {
                g.remove_edge(edge)?;
            }
            let index = g
                .store
                .node_index(id)
                .ok_or(GraphError::NotFound(ItemRef::Node(id)))?;
            let node = g
                .store
                .node(id)
                .cloned()
                .ok_or(GraphError::NotFound(ItemRef::Node(id)))?;
            g.record(Mutation::RemoveNode {
                index,
                node: node.clone(),
            })?;
            Ok(node)
        })
    }

    /// Connect an output to an input on another node.
    pub fn add_edge(&mut self, source: ConnectionRef, target: ConnectionRef) -> Result<EdgeId> {
        self.store.validate_edge(source, target)?;
        self.atomic(|g| {
            let id = g.store.allocate_edge_id();
            let index = g.store.edge_count();
            g.record(Mutation::AddEdge {
                index,
                edge: Edge { id, source, target },
            })?;
            Ok(id)
        })
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Result<Edge> {
        self.atomic(|g| {
            let index = g
                .store
                .edge_index(id)
                .ok_or(GraphError::NotFound(ItemRef::Edge(id)))?;
            let edge = *g
                .store
                .edge(id)
                .ok_or(GraphError::NotFound(ItemRef::Edge(id)))?;
            g.record(Mutation::RemoveEdge { index, edge })?;
            Ok(edge)
        })
    }

    /// Create or replace an attribute. Replacing keeps the attribute's slot
    /// and requires the same value kind. Setting an identical value is a no-op.
    pub fn set_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: AttrValue,
    ) -> Result<()> {
        let target = self
            .store
            .node(node)
            .ok_or(GraphError::NotFound(ItemRef::Node(node)))?;
        let (slot, before) = match target.attributes.get_full(name) {
            Some((slot, _, existing)) => {
                if existing.kind() != value.kind() {
                    return Err(GraphError::TypeMismatch {
                        node,
                        attribute: name.to_string(),
                        expected: existing.kind(),
                        found: value.kind(),
                    });
                }
                if *existing == value {
                    return Ok(());
                }
                (slot, Some(existing.clone()))
            }
            None => (target.attributes.len(), None),
        };
        self.atomic(|g| {
            g.record(Mutation::SetAttribute {
                node,
                name: name.to_string(),
                slot,
                before,
                after: Some(value),
            })
        })
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<AttrValue> {
        let target = self
            .store
            .node(node)
            .ok_or(GraphError::NotFound(ItemRef::Node(node)))?;
        let (slot, _, value) = target
            .attributes
            .get_full(name)
            .ok_or_else(|| GraphError::NotFound(ItemRef::Attribute(node, name.to_string())))?;
        let value = value.clone();
        self.atomic(|g| {
            g.record(Mutation::SetAttribute {
                node,
                name: name.to_string(),
                slot,
                before: Some(value.clone()),
                after: None,
            })?;
            Ok(value)
        })
    }

    pub fn move_node(&mut self, node: NodeId, to: Point) -> Result<()> {
        let before = self
            .store
            .node(node)
            .ok_or(GraphError::NotFound(ItemRef::Node(node)))?
            .position;
        if before == to {
            return Ok(());
        }
        self.atomic(|g| {
            g.record(Mutation::MoveNode {
                node,
                before,
                after: to,
            })
        })
    }

    pub fn rename_node(&mut self, node: NodeId, name: &str) -> Result<()> {
        let before = self
            .store
            .node(node)
            .ok_or(GraphError::NotFound(ItemRef::Node(node)))?
            .name
            .clone();
        if before == name {
            return Ok(());
        }
        self.atomic(|g| {
            g.record(Mutation::RenameNode {
                node,
                before,
                after: name.to_string(),
            })
        })
    }
}
