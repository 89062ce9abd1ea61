//! Typed failures of the graph model, commands and scene handler.

use crate::model::{AttrKind, ConnectionRef, EdgeId, ItemRef, NodeId};

/// Every failure the core can report. None of them leave partial state behind.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("{0} not found")]
    NotFound(ItemRef),

    #[error("duplicate identifier: {0}")]
    DuplicateIdentifier(ItemRef),

    /// An edge endpoint does not resolve to a live connection.
    #[error("edge endpoint {0} does not resolve to a live connection")]
    DanglingConnection(ConnectionRef),

    // Fields are not named `source`: thiserror would treat that as the error cause.
    #[error("cannot connect {from} to {to}: needs exactly one output and one input")]
    IncompatibleDirection { from: ConnectionRef, to: ConnectionRef },

    #[error("input {input} is already driven by {edge}")]
    InputAlreadyOccupied { input: ConnectionRef, edge: EdgeId },

    #[error("cannot connect {0} to itself")]
    SameNode(NodeId),

    #[error("attribute '{attribute}' on {node} is {expected}, got {found}")]
    TypeMismatch {
        node: NodeId,
        attribute: String,
        expected: AttrKind,
        found: AttrKind,
    },

    /// A transaction was opened while another one is still open.
    #[error("mutation attempted while a graph transaction is already open")]
    ReentrantMutation,

    #[error("no graph transaction is open")]
    TransactionNotOpen,

    /// A commit/cancel intent arrived without a matching begin intent.
    #[error("no interaction in progress")]
    NoPendingInteraction,

    /// A derived view or scene lost track of the graph. Fatal for the host.
    #[error("internal consistency fault: {0}")]
    InternalConsistency(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;
