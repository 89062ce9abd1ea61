//! The canonical node/edge storage with keyed lookups and edge indexes.

use super::mutation::Mutation;
use crate::error::{GraphError, Result};
use crate::model::{Connection, ConnectionRef, Edge, EdgeId, ItemRef, Node, NodeId};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;

/// Nodes and edges keyed by identifier, in display (insertion) order.
///
/// Read access is public; writes go exclusively through [`GraphStore::apply`],
/// which is only reachable via [`super::Graph`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphStore {
    nodes: IndexMap<NodeId, Node>,
    edges: IndexMap<EdgeId, Edge>,
    /// Input connection → the single edge driving it.
    #[serde(skip)]
    incoming: HashMap<ConnectionRef, EdgeId>,
    /// Output connection → edges it drives, in creation order.
    #[serde(skip)]
    outgoing: HashMap<ConnectionRef, Vec<EdgeId>>,
    #[serde(skip)]
    next_node: u64,
    #[serde(skip)]
    next_edge: u64,
}

/// Equality is structural and order-sensitive: same nodes and edges in the
/// same display order. Id allocation counters are not part of the state.
impl PartialEq for GraphStore {
    fn eq(&self, other: &Self) -> bool {
        self.nodes.len() == other.nodes.len()
            && self.edges.len() == other.edges.len()
            && self.nodes.iter().eq(other.nodes.iter())
            && self.edges.iter().eq(other.edges.iter())
    }
}

impl GraphStore {
    // ── lookups ────────────────────────────────────────────────────────────

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn contains_edge(&self, id: EdgeId) -> bool {
        self.edges.contains_key(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.keys().copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Position of a node in display order.
    pub fn node_index(&self, id: NodeId) -> Option<usize> {
        self.nodes.get_index_of(&id)
    }

    pub fn edge_index(&self, id: EdgeId) -> Option<usize> {
        self.edges.get_index_of(&id)
    }

    pub fn node_connections(&self, id: NodeId) -> Option<&[Connection]> {
        self.nodes.get(&id).map(|n| n.connections.as_slice())
    }

    pub fn connection(&self, cref: ConnectionRef) -> Option<&Connection> {
        self.nodes.get(&cref.node).and_then(|n| n.connection(cref.port))
    }

    /// The edge driving an input connection, if any.
    pub fn edge_into(&self, input: ConnectionRef) -> Option<EdgeId> {
        self.incoming.get(&input).copied()
    }

    /// Edges driven by an output connection.
    pub fn edges_from(&self, output: ConnectionRef) -> &[EdgeId] {
        self.outgoing.get(&output).map_or(&[], Vec::as_slice)
    }

    /// Every edge touching any connection of the node, in edge display order.
    pub fn edges_of_node(&self, id: NodeId) -> Vec<EdgeId> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let mut ids: Vec<EdgeId> = Vec::new();
        for conn in &node.connections {
            let cref = ConnectionRef::new(id, conn.id);
            if let Some(e) = self.incoming.get(&cref) {
                ids.push(*e);
            }
            if let Some(es) = self.outgoing.get(&cref) {
                ids.extend(es.iter().copied());
            }
        }
        ids.sort_by_key(|e| self.edges.get_index_of(e));
        ids.dedup();
        ids
    }

    /// Human-readable `Node.port` label for a connection.
    pub fn connection_label(&self, cref: ConnectionRef) -> String {
        match self.nodes.get(&cref.node) {
            Some(node) => match node.connection(cref.port) {
                Some(conn) => format!("{}.{}", node.name, conn.name),
                None => format!("{}.?", node.name),
            },
            None => cref.to_string(),
        }
    }

    // ── validation ─────────────────────────────────────────────────────────

    fn resolve(&self, cref: ConnectionRef) -> Result<&Connection> {
        let node = self
            .nodes
            .get(&cref.node)
            .ok_or(GraphError::NotFound(ItemRef::Node(cref.node)))?;
        node.connection(cref.port)
            .ok_or(GraphError::DanglingConnection(cref))
    }

    /// Check that an edge `source → target` may be created right now.
    ///
    /// `source` must be an output and `target` an input on a different node,
    /// and the input must be free. Never mutates.
    pub fn validate_edge(&self, source: ConnectionRef, target: ConnectionRef) -> Result<()> {
        let src = self.resolve(source)?;
        let dst = self.resolve(target)?;
        if source.node == target.node {
            return Err(GraphError::SameNode(source.node));
        }
        if !src.is_output() || !dst.is_input() {
            return Err(GraphError::IncompatibleDirection {
                from: source,
                to: target,
            });
        }
        if let Some(edge) = self.edge_into(target) {
            return Err(GraphError::InputAlreadyOccupied {
                input: target,
                edge,
            });
        }
        Ok(())
    }

    // ── id allocation ──────────────────────────────────────────────────────

    pub(crate) fn allocate_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    pub(crate) fn allocate_edge_id(&mut self) -> EdgeId {
        let id = EdgeId(self.next_edge);
        self.next_edge += 1;
        id
    }

    // ── mutation ───────────────────────────────────────────────────────────

    /// Apply one primitive mutation, or fail without touching anything.
    pub(crate) fn apply(&mut self, mutation: &Mutation) -> Result<()> {
        match mutation {
            Mutation::AddNode { index, node } => {
                if self.nodes.contains_key(&node.id) {
                    return Err(GraphError::DuplicateIdentifier(ItemRef::Node(node.id)));
                }
                check_ports(node)?;
                let index = (*index).min(self.nodes.len());
                self.nodes.shift_insert(index, node.id, node.clone());
                self.next_node = self.next_node.max(node.id.0 + 1);
            }
            Mutation::RemoveNode { node, .. } => {
                if !self.nodes.contains_key(&node.id) {
                    return Err(GraphError::NotFound(ItemRef::Node(node.id)));
                }
                // Cascaded edges are removed by earlier mutations in the same
                // transaction; a node with live edges would leave them dangling.
                if let Some(edge) = self.edges_of_node(node.id).first() {
                    let dangling = self.edges[edge].target;
                    let dangling = if dangling.node == node.id {
                        dangling
                    } else {
                        self.edges[edge].source
                    };
                    return Err(GraphError::DanglingConnection(dangling));
                }
                self.nodes.shift_remove(&node.id);
            }
            Mutation::AddEdge { index, edge } => {
                if self.edges.contains_key(&edge.id) {
                    return Err(GraphError::DuplicateIdentifier(ItemRef::Edge(edge.id)));
                }
                self.validate_edge(edge.source, edge.target)?;
                let index = (*index).min(self.edges.len());
                self.edges.shift_insert(index, edge.id, *edge);
                self.incoming.insert(edge.target, edge.id);
                let out = self.outgoing.entry(edge.source).or_default();
                out.push(edge.id);
                out.sort();
                self.next_edge = self.next_edge.max(edge.id.0 + 1);
            }
            Mutation::RemoveEdge { edge, .. } => {
                let Some(stored) = self.edges.shift_remove(&edge.id) else {
                    return Err(GraphError::NotFound(ItemRef::Edge(edge.id)));
                };
                self.incoming.remove(&stored.target);
                if let Some(out) = self.outgoing.get_mut(&stored.source) {
                    out.retain(|e| *e != stored.id);
                    if out.is_empty() {
                        self.outgoing.remove(&stored.source);
                    }
                }
            }
            Mutation::SetAttribute {
                node,
                name,
                slot,
                after,
                ..
            } => {
                let target = self
                    .nodes
                    .get_mut(node)
                    .ok_or(GraphError::NotFound(ItemRef::Node(*node)))?;
                match after {
                    Some(value) => {
                        if let Some(existing) = target.attributes.get_mut(name) {
                            *existing = value.clone();
                        } else {
                            let slot = (*slot).min(target.attributes.len());
                            target.attributes.shift_insert(slot, name.clone(), value.clone());
                        }
                    }
                    None => {
                        if target.attributes.shift_remove(name).is_none() {
                            return Err(GraphError::NotFound(ItemRef::Attribute(
                                *node,
                                name.clone(),
                            )));
                        }
                    }
                }
            }
            Mutation::MoveNode { node, after, .. } => {
                let target = self
                    .nodes
                    .get_mut(node)
                    .ok_or(GraphError::NotFound(ItemRef::Node(*node)))?;
                target.position = *after;
            }
            Mutation::RenameNode { node, after, .. } => {
                let target = self
                    .nodes
                    .get_mut(node)
                    .ok_or(GraphError::NotFound(ItemRef::Node(*node)))?;
                target.name.clone_from(after);
            }
        }
        Ok(())
    }
}

/// Port names and ids must be unique within a node.
fn check_ports(node: &Node) -> Result<()> {
    for (i, conn) in node.connections.iter().enumerate() {
        let rest = &node.connections[i + 1..];
        if rest.iter().any(|c| c.name == conn.name) {
            return Err(GraphError::DuplicateIdentifier(ItemRef::PortName(
                node.id,
                conn.name.clone(),
            )));
        }
        if rest.iter().any(|c| c.id == conn.id) {
            return Err(GraphError::DuplicateIdentifier(ItemRef::Connection(
                ConnectionRef::new(node.id, conn.id),
            )));
        }
    }
    Ok(())
}
