//! Primitive, exactly invertible graph mutations and the change sets that
//! group them.
//!
//! A [`Mutation`] doubles as the change event delivered to listeners: it
//! names the kind of change, the affected identifiers and the before/after
//! payload. Undo replays [`Mutation::inverse`] in reverse order.

use crate::model::{AttrValue, Edge, EdgeId, Node, NodeId, Point};
use serde::{Deserialize, Serialize};

/// Coarse classification of a mutation, for listeners that only care about kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    NodeAdded,
    NodeRemoved,
    EdgeAdded,
    EdgeRemoved,
    AttributeChanged,
    NodeMoved,
    NodeRenamed,
}

/// One primitive change to the graph store.
///
/// Every variant carries enough state to be inverted without consulting the
/// graph: full snapshots for structural changes (including the insertion
/// position, so undo restores display order) and before/after values for
/// property edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    AddNode {
        /// Position in the graph's node order.
        index: usize,
        node: Node,
    },
    RemoveNode {
        index: usize,
        node: Node,
    },
    AddEdge {
        index: usize,
        edge: Edge,
    },
    RemoveEdge {
        index: usize,
        edge: Edge,
    },
    /// Create, replace or remove a single attribute.
    ///
    /// `before == None` creates the attribute, `after == None` removes it.
    /// `slot` is the attribute's position in the node's attribute order.
    SetAttribute {
        node: NodeId,
        name: String,
        slot: usize,
        before: Option<AttrValue>,
        after: Option<AttrValue>,
    },
    MoveNode {
        node: NodeId,
        before: Point,
        after: Point,
    },
    RenameNode {
        node: NodeId,
        before: String,
        after: String,
    },
}

impl Mutation {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Mutation::AddNode { .. } => ChangeKind::NodeAdded,
            Mutation::RemoveNode { .. } => ChangeKind::NodeRemoved,
            Mutation::AddEdge { .. } => ChangeKind::EdgeAdded,
            Mutation::RemoveEdge { .. } => ChangeKind::EdgeRemoved,
            Mutation::SetAttribute { .. } => ChangeKind::AttributeChanged,
            Mutation::MoveNode { .. } => ChangeKind::NodeMoved,
            Mutation::RenameNode { .. } => ChangeKind::NodeRenamed,
        }
    }

    /// The exact inverse: applying `m` then `m.inverse()` leaves the store unchanged.
    pub fn inverse(&self) -> Mutation {
        match self {
            Mutation::AddNode { index, node } => Mutation::RemoveNode {
                index: *index,
                node: node.clone(),
            },
            Mutation::RemoveNode { index, node } => Mutation::AddNode {
                index: *index,
                node: node.clone(),
            },
            Mutation::AddEdge { index, edge } => Mutation::RemoveEdge {
                index: *index,
                edge: *edge,
            },
            Mutation::RemoveEdge { index, edge } => Mutation::AddEdge {
                index: *index,
                edge: *edge,
            },
            Mutation::SetAttribute {
                node,
                name,
                slot,
                before,
                after,
            } => Mutation::SetAttribute {
                node: *node,
                name: name.clone(),
                slot: *slot,
                before: after.clone(),
                after: before.clone(),
            },
            Mutation::MoveNode { node, before, after } => Mutation::MoveNode {
                node: *node,
                before: *after,
                after: *before,
            },
            Mutation::RenameNode { node, before, after } => Mutation::RenameNode {
                node: *node,
                before: after.clone(),
                after: before.clone(),
            },
        }
    }

    /// The node this mutation is about, if any. Edge mutations return `None`.
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            Mutation::AddNode { node, .. } | Mutation::RemoveNode { node, .. } => Some(node.id),
            Mutation::SetAttribute { node, .. }
            | Mutation::MoveNode { node, .. }
            | Mutation::RenameNode { node, .. } => Some(*node),
            Mutation::AddEdge { .. } | Mutation::RemoveEdge { .. } => None,
        }
    }

    pub fn edge_id(&self) -> Option<EdgeId> {
        match self {
            Mutation::AddEdge { edge, .. } | Mutation::RemoveEdge { edge, .. } => Some(edge.id),
            _ => None,
        }
    }

    /// True for edits of an existing node's properties (no structural change).
    pub fn is_property_edit(&self) -> bool {
        matches!(
            self,
            Mutation::SetAttribute { .. } | Mutation::MoveNode { .. } | Mutation::RenameNode { .. }
        )
    }

    /// True when `other` edits the same property of the same node, so the two
    /// can collapse into a single edit.
    pub fn same_target(&self, other: &Mutation) -> bool {
        match (self, other) {
            (
                Mutation::SetAttribute { node: a, name: na, .. },
                Mutation::SetAttribute { node: b, name: nb, .. },
            ) => a == b && na == nb,
            (Mutation::MoveNode { node: a, .. }, Mutation::MoveNode { node: b, .. }) => a == b,
            (Mutation::RenameNode { node: a, .. }, Mutation::RenameNode { node: b, .. }) => a == b,
            _ => false,
        }
    }

    /// Combine two edits of the same target: keep this one's `before` and
    /// `later`'s `after`. Returns `None` when the targets differ.
    pub fn merged_with(&self, later: &Mutation) -> Option<Mutation> {
        if !self.same_target(later) {
            return None;
        }
        match (self, later) {
            (
                Mutation::SetAttribute {
                    node, name, slot, before, ..
                },
                Mutation::SetAttribute { after, .. },
            ) => Some(Mutation::SetAttribute {
                node: *node,
                name: name.clone(),
                slot: *slot,
                before: before.clone(),
                after: after.clone(),
            }),
            (Mutation::MoveNode { node, before, .. }, Mutation::MoveNode { after, .. }) => {
                Some(Mutation::MoveNode {
                    node: *node,
                    before: *before,
                    after: *after,
                })
            }
            (Mutation::RenameNode { node, before, .. }, Mutation::RenameNode { after, .. }) => {
                Some(Mutation::RenameNode {
                    node: *node,
                    before: before.clone(),
                    after: after.clone(),
                })
            }
            _ => None,
        }
    }
}

/// All mutations committed by one graph transaction, in application order.
///
/// Listeners receive one `ChangeSet` per user action, so a node delete and its
/// cascaded edge deletes always arrive together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    mutations: Vec<Mutation>,
}

impl ChangeSet {
    pub fn new(mutations: Vec<Mutation>) -> Self {
        Self { mutations }
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Mutation> {
        self.mutations.iter()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.mutations.iter().filter(|m| m.kind() == kind).count()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Mutation;
    type IntoIter = std::slice::Iter<'a, Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutations.iter()
    }
}
