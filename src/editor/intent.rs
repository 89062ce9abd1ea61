use crate::error::GraphError;
use crate::graph::{ChangeSet, Mutation};
use crate::model::{AttrValue, ConnectionRef, EdgeId, NodeId, NodeSpec, Point};
use crate::scene::SceneItemId;
use serde::{Deserialize, Serialize};

/// A user gesture or editor action, as sent by the graphics layer, the
/// attribute editor or the menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", content = "args", rename_all = "kebab-case")]
pub enum Intent {
    AddNode(NodeSpec),
    /// Delete nodes with all their edges as a single undo step.
    DeleteNodes(Vec<NodeId>),
    DeleteEdges(Vec<EdgeId>),
    DeleteSelection,
    Select {
        items: Vec<SceneItemId>,
        #[serde(default)]
        extend: bool,
    },
    ClearSelection,

    /// Preview a move of `nodes` by `(dx, dy)` from where the drag started.
    DragNodes {
        nodes: Vec<NodeId>,
        dx: f32,
        dy: f32,
    },
    ReleaseDrag,
    CancelDrag,
    MoveNode {
        node: NodeId,
        to: Point,
    },

    BeginConnect(ConnectionRef),
    CompleteConnect(ConnectionRef),
    CancelConnect,
    Connect {
        source: ConnectionRef,
        target: ConnectionRef,
    },

    SetAttribute {
        node: NodeId,
        name: String,
        value: AttrValue,
    },
    RemoveAttribute {
        node: NodeId,
        name: String,
    },
    RenameNode {
        node: NodeId,
        name: String,
    },

    Undo,
    Redo,
}

impl Intent {
    /// Short name used in log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Intent::AddNode(_) => "add node",
            Intent::DeleteNodes(_) => "delete nodes",
            Intent::DeleteEdges(_) => "delete edges",
            Intent::DeleteSelection => "delete selection",
            Intent::Select { .. } => "select",
            Intent::ClearSelection => "clear selection",
            Intent::DragNodes { .. } => "drag nodes",
            Intent::ReleaseDrag => "release drag",
            Intent::CancelDrag => "cancel drag",
            Intent::MoveNode { .. } => "move node",
            Intent::BeginConnect(_) => "begin connect",
            Intent::CompleteConnect(_) => "complete connect",
            Intent::CancelConnect => "cancel connect",
            Intent::Connect { .. } => "connect",
            Intent::SetAttribute { .. } => "set attribute",
            Intent::RemoveAttribute { .. } => "remove attribute",
            Intent::RenameNode { .. } => "rename node",
            Intent::Undo => "undo",
            Intent::Redo => "redo",
        }
    }
}

/// What handling an intent did.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A new command was applied and pushed on the undo stack.
    Committed { label: String, change: ChangeSet },
    Undone { label: String, change: ChangeSet },
    Redone { label: String, change: ChangeSet },
    /// An interaction started or its preview changed; the graph is untouched.
    Pending,
    /// An interaction was aborted; the graph is untouched.
    Cancelled,
    SelectionChanged,
    /// Nothing to do: empty undo/redo side, identical value, empty delete.
    Nothing,
}

impl Outcome {
    pub fn change(&self) -> Option<&ChangeSet> {
        match self {
            Outcome::Committed { change, .. }
            | Outcome::Undone { change, .. }
            | Outcome::Redone { change, .. } => Some(change),
            _ => None,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed { .. })
    }

    /// Id of the first node added by this outcome.
    pub fn created_node(&self) -> Option<NodeId> {
        self.change()?.iter().find_map(|m| match m {
            Mutation::AddNode { node, .. } => Some(node.id),
            _ => None,
        })
    }

    /// Id of the first edge added by this outcome.
    pub fn created_edge(&self) -> Option<EdgeId> {
        self.change()?.iter().find_map(|m| match m {
            Mutation::AddEdge { edge, .. } => Some(edge.id),
            _ => None,
        })
    }
}

pub type CommandResult = Result<Outcome, GraphError>;
