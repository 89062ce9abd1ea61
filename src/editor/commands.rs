//! Undoable commands and the undo/redo stack.
//!
//! A command records mutations that have already been applied to the graph.
//! The stack never re-applies on `push`; it replays inverses on `undo` and
//! the recorded mutations on `redo`, each inside a single graph transaction
//! so listeners see one change set per step.
//!
//! # Example
//!
//! ```rust
//! use scenegraph::editor::{CommandStack, SceneChangedCommand, SceneCommand};
//! use scenegraph::graph::Graph;
//! use scenegraph::model::{NodeSpec, Point};
//!
//! let mut graph = Graph::new();
//! let mut stack = CommandStack::new(100);
//!
//! graph.begin_transaction().unwrap();
//! graph.add_node(NodeSpec::new("A", Point::default())).unwrap();
//! let change = graph.commit_transaction().unwrap();
//! stack.push(SceneCommand::Changed(SceneChangedCommand::new("Add A", change.into_mutations())));
//!
//! stack.undo(&mut graph).unwrap(); // removes A
//! assert_eq!(graph.store().node_count(), 0);
//! stack.redo(&mut graph).unwrap(); // adds A back
//! assert_eq!(graph.store().node_count(), 1);
//! ```

use crate::error::Result;
use crate::graph::{ChangeSet, Graph, Mutation};

// ────────────────────────────────────────────────────────────────────────────
// Commands
// ────────────────────────────────────────────────────────────────────────────

/// Property edits (move, rename, attribute) on existing nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNodesCommand {
    label: String,
    edits: Vec<Mutation>,
}

impl SceneNodesCommand {
    pub fn new(label: impl Into<String>, edits: Vec<Mutation>) -> Self {
        debug_assert!(edits.iter().all(Mutation::is_property_edit));
        Self {
            label: label.into(),
            edits,
        }
    }

    pub fn edits(&self) -> &[Mutation] {
        &self.edits
    }

    /// Collapse `later` into this command when both edit exactly the same
    /// properties of the same nodes, in the same order.
    pub fn merged_with(&self, later: &SceneNodesCommand) -> Option<SceneNodesCommand> {
        if self.edits.len() != later.edits.len() {
            return None;
        }
        let edits = self
            .edits
            .iter()
            .zip(&later.edits)
            .map(|(a, b)| a.merged_with(b))
            .collect::<Option<Vec<_>>>()?;
        Some(SceneNodesCommand {
            label: later.label.clone(),
            edits,
        })
    }
}

/// A batch of structural mutations applied and inverted as one unit, e.g. a
/// multi-node delete with all cascaded edge deletions.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneChangedCommand {
    label: String,
    mutations: Vec<Mutation>,
}

impl SceneChangedCommand {
    pub fn new(label: impl Into<String>, mutations: Vec<Mutation>) -> Self {
        Self {
            label: label.into(),
            mutations,
        }
    }
}

/// One undo step.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneCommand {
    Nodes(SceneNodesCommand),
    Changed(SceneChangedCommand),
}

impl SceneCommand {
    pub fn label(&self) -> &str {
        match self {
            SceneCommand::Nodes(c) => &c.label,
            SceneCommand::Changed(c) => &c.label,
        }
    }

    /// Forward mutations in application order.
    pub fn mutations(&self) -> &[Mutation] {
        match self {
            SceneCommand::Nodes(c) => &c.edits,
            SceneCommand::Changed(c) => &c.mutations,
        }
    }

    /// Re-apply the forward mutations as one transaction.
    pub fn redo(&self, graph: &mut Graph) -> Result<ChangeSet> {
        run_transaction(graph, self.mutations().iter().cloned())
    }

    /// Apply the exact inverse as one transaction: inverses in reverse order.
    pub fn undo(&self, graph: &mut Graph) -> Result<ChangeSet> {
        run_transaction(graph, self.mutations().iter().rev().map(Mutation::inverse))
    }
}

fn run_transaction(
    graph: &mut Graph,
    mutations: impl Iterator<Item = Mutation>,
) -> Result<ChangeSet> {
    graph.begin_transaction()?;
    for m in mutations {
        if let Err(err) = graph.apply(&m) {
            graph.rollback_transaction()?;
            return Err(err);
        }
    }
    graph.commit_transaction()
}

// ────────────────────────────────────────────────────────────────────────────
// Command stack
// ────────────────────────────────────────────────────────────────────────────

/// Linear undo/redo history.
///
/// `commands[..cursor]` are applied, `commands[cursor..]` can be redone.
#[derive(Debug, Clone)]
pub struct CommandStack {
    commands: Vec<SceneCommand>,
    cursor: usize,
    limit: usize,
    /// Cursor position at which the document was last saved.
    clean: Option<usize>,
    merge_property_edits: bool,
}

impl CommandStack {
    /// Create a stack holding at most `limit` undo steps; `usize::MAX` keeps all.
    pub fn new(limit: usize) -> Self {
        Self {
            commands: Vec::new(),
            cursor: 0,
            limit: limit.max(1),
            clean: Some(0),
            merge_property_edits: false,
        }
    }

    /// Collapse consecutive property edits of the same targets into one step.
    pub fn with_merging(mut self, enabled: bool) -> Self {
        self.merge_property_edits = enabled;
        self
    }

    /// Record an already-applied command and drop the redo tail.
    pub fn push(&mut self, command: SceneCommand) {
        if self.cursor < self.commands.len() {
            self.commands.truncate(self.cursor);
            if self.clean.is_some_and(|c| c > self.cursor) {
                self.clean = None;
            }
        }
        if let Some(merged) = self.try_merge(&command) {
            log::debug!("merged '{}' into previous command", command.label());
            self.commands[self.cursor - 1] = merged;
            return;
        }
        log::info!("command: {}", command.label());
        self.commands.push(command);
        self.cursor = self.commands.len();
        if self.commands.len() > self.limit {
            self.commands.remove(0);
            self.cursor -= 1;
            self.clean = self.clean.and_then(|c| c.checked_sub(1));
        }
    }

    fn try_merge(&self, command: &SceneCommand) -> Option<SceneCommand> {
        if !self.merge_property_edits || self.cursor == 0 || self.clean == Some(self.cursor) {
            return None;
        }
        match (&self.commands[self.cursor - 1], command) {
            (SceneCommand::Nodes(prev), SceneCommand::Nodes(next)) => {
                prev.merged_with(next).map(SceneCommand::Nodes)
            }
            _ => None,
        }
    }

    /// Revert the most recent applied command. `Ok(None)` when there is
    /// nothing to undo.
    pub fn undo(&mut self, graph: &mut Graph) -> Result<Option<ChangeSet>> {
        if self.cursor == 0 {
            return Ok(None);
        }
        let command = &self.commands[self.cursor - 1];
        let change = command.undo(graph)?;
        log::info!("undo: {}", command.label());
        self.cursor -= 1;
        Ok(Some(change))
    }

    /// Re-apply the next undone command. `Ok(None)` when there is nothing to redo.
    pub fn redo(&mut self, graph: &mut Graph) -> Result<Option<ChangeSet>> {
        let Some(command) = self.commands.get(self.cursor) else {
            return Ok(None);
        };
        let change = command.redo(graph)?;
        log::info!("redo: {}", command.label());
        self.cursor += 1;
        Ok(Some(change))
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.commands.len()
    }

    pub fn undo_text(&self) -> Option<&str> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.commands.get(i))
            .map(SceneCommand::label)
    }

    pub fn redo_text(&self) -> Option<&str> {
        self.commands.get(self.cursor).map(SceneCommand::label)
    }

    /// Number of applied commands.
    pub fn index(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[SceneCommand] {
        &self.commands
    }

    /// Mark the current state as saved.
    pub fn set_clean(&mut self) {
        self.clean = Some(self.cursor);
    }

    pub fn is_clean(&self) -> bool {
        self.clean == Some(self.cursor)
    }

    /// Forget all history. The current state becomes the clean state.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.cursor = 0;
        self.clean = Some(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeId, NodeSpec, Point};

    fn add_node(graph: &mut Graph, stack: &mut CommandStack, name: &str) -> NodeId {
        graph.begin_transaction().unwrap();
        let id = graph.add_node(NodeSpec::new(name, Point::default())).unwrap();
        let change = graph.commit_transaction().unwrap();
        stack.push(SceneCommand::Changed(SceneChangedCommand::new(
            format!("Add {}", name),
            change.into_mutations(),
        )));
        id
    }

    fn move_node(graph: &mut Graph, stack: &mut CommandStack, id: NodeId, x: f32) {
        graph.begin_transaction().unwrap();
        graph.move_node(id, Point::new(x, 0.0)).unwrap();
        let change = graph.commit_transaction().unwrap();
        stack.push(SceneCommand::Nodes(SceneNodesCommand::new(
            "Move",
            change.into_mutations(),
        )));
    }

    #[test]
    fn test_undo_redo_move() {
        let mut graph = Graph::new();
        let mut stack = CommandStack::new(100);
        let id = add_node(&mut graph, &mut stack, "A");
        move_node(&mut graph, &mut stack, id, 50.0);

        assert!(stack.undo(&mut graph).unwrap().is_some());
        assert_eq!(graph.store().node(id).unwrap().position, Point::default());
        assert!(stack.redo(&mut graph).unwrap().is_some());
        assert_eq!(graph.store().node(id).unwrap().position, Point::new(50.0, 0.0));
    }

    #[test]
    fn test_empty_stack_is_noop() {
        let mut graph = Graph::new();
        let mut stack = CommandStack::new(10);
        assert_eq!(stack.undo(&mut graph).unwrap(), None);
        assert_eq!(stack.redo(&mut graph).unwrap(), None);
    }

    #[test]
    fn test_push_truncates_redo_tail() {
        let mut graph = Graph::new();
        let mut stack = CommandStack::new(10);
        add_node(&mut graph, &mut stack, "A");
        add_node(&mut graph, &mut stack, "B");
        stack.undo(&mut graph).unwrap();
        assert!(stack.can_redo());
        add_node(&mut graph, &mut stack, "C");
        assert!(!stack.can_redo());
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.undo_text(), Some("Add C"));
    }

    #[test]
    fn test_history_limit() {
        let mut graph = Graph::new();
        let mut stack = CommandStack::new(3);
        for name in ["A", "B", "C", "D", "E"] {
            add_node(&mut graph, &mut stack, name);
        }
        let mut undone = 0;
        while stack.undo(&mut graph).unwrap().is_some() {
            undone += 1;
        }
        assert_eq!(undone, 3);
        assert_eq!(graph.store().node_count(), 2);
    }

    #[test]
    fn test_merging_collapses_consecutive_moves() {
        let mut graph = Graph::new();
        let mut stack = CommandStack::new(10).with_merging(true);
        let id = add_node(&mut graph, &mut stack, "A");
        for x in [10.0, 20.0, 30.0] {
            move_node(&mut graph, &mut stack, id, x);
        }
        assert_eq!(stack.len(), 2);
        stack.undo(&mut graph).unwrap();
        assert_eq!(graph.store().node(id).unwrap().position, Point::default());
    }

    #[test]
    fn test_clean_state_blocks_merge_and_tracks_cursor() {
        let mut graph = Graph::new();
        let mut stack = CommandStack::new(10).with_merging(true);
        let id = add_node(&mut graph, &mut stack, "A");
        move_node(&mut graph, &mut stack, id, 10.0);
        stack.set_clean();
        move_node(&mut graph, &mut stack, id, 20.0);
        assert_eq!(stack.len(), 3);
        assert!(!stack.is_clean());
        stack.undo(&mut graph).unwrap();
        assert!(stack.is_clean());
    }
}
