use super::commands::{CommandStack, SceneChangedCommand, SceneCommand, SceneNodesCommand};
use super::intent::{CommandResult, Intent, Outcome};
use crate::config::EditorConfig;
use crate::error::{GraphError, Result};
use crate::graph::{
    ChangeSet, ConsistencyFault, Graph, GraphListener, GraphStore, ListenerId, Mutation,
};
use crate::model::{AttrValue, ConnectionRef, Direction, EdgeId, ItemRef, NodeId, NodeSpec, Point};
use crate::scene::GraphicsScene;
use crate::views::{EdgesListModel, GraphTableModel, NodesListModel, ViewModel, Views};
use indexmap::IndexSet;

/// Turns intents into validated graph transactions and undoable commands,
/// then forwards every committed change set to the scene and the views.
///
/// The handler owns the graph: nothing else can mutate it.
#[derive(Debug)]
pub struct SceneHandler {
    graph: Graph,
    stack: CommandStack,
    scene: GraphicsScene,
    views: Views,
    /// Connection a connect drag started from.
    pending_connect: Option<ConnectionRef>,
    config: EditorConfig,
}

impl Default for SceneHandler {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl SceneHandler {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            graph: Graph::new(),
            stack: CommandStack::new(config.history_limit)
                .with_merging(config.merge_property_edits),
            scene: GraphicsScene::new(),
            views: Views::new(config.nodes_sort, config.edges_sort, config.table_sort),
            pending_connect: None,
            config,
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Accessors
    // ────────────────────────────────────────────────────────────────────────

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn store(&self) -> &GraphStore {
        self.graph.store()
    }

    pub fn stack(&self) -> &CommandStack {
        &self.stack
    }

    pub fn scene(&self) -> &GraphicsScene {
        &self.scene
    }

    /// For draining directives. Selection and drags go through [`Self::handle`].
    pub fn scene_mut(&mut self) -> &mut GraphicsScene {
        &mut self.scene
    }

    pub fn views(&self) -> &Views {
        &self.views
    }

    /// For draining view events and dirty flags.
    pub fn views_mut(&mut self) -> &mut Views {
        &mut self.views
    }

    pub fn nodes_model(&self) -> &NodesListModel {
        &self.views.nodes
    }

    pub fn edges_model(&self) -> &EdgesListModel {
        &self.views.edges
    }

    pub fn table_model(&self) -> &GraphTableModel {
        &self.views.table
    }

    pub fn pending_connect(&self) -> Option<ConnectionRef> {
        self.pending_connect
    }

    /// Register an additional observer of committed change sets.
    pub fn subscribe(&mut self, listener: Box<dyn GraphListener>) -> ListenerId {
        self.graph.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.graph.unsubscribe(id)
    }

    /// Mark the current state as saved.
    pub fn set_clean(&mut self) {
        self.stack.set_clean();
    }

    pub fn is_clean(&self) -> bool {
        self.stack.is_clean()
    }

    /// Rebuild the scene and every view from the graph.
    pub fn rebuild_views(&mut self) {
        let store = self.graph.store();
        self.scene.rebuild(store);
        for view in self.views.all_mut() {
            view.rebuild(store);
        }
    }

    /// Check that the scene and every view hold exactly the graph's live ids.
    pub fn verify_views(&self) -> Result<()> {
        let store = self.graph.store();
        let mut faults = Vec::new();
        if let Err(fault) = self.scene.verify(store) {
            faults.push(fault);
        }
        for view in self.views.all() {
            if let Err(fault) = view.verify(store) {
                faults.push(fault);
            }
        }
        consistency_error(faults)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Intents
    // ────────────────────────────────────────────────────────────────────────

    /// Handle one intent. Every change it causes is applied, announced and
    /// processed by all observers before this returns. On error the graph,
    /// the stack, the scene and the views are as they were.
    pub fn handle(&mut self, intent: Intent) -> CommandResult {
        let label = intent.label();
        let result = self.dispatch(intent);
        match &result {
            Ok(Outcome::Nothing) => log::debug!("{}: nothing to do", label),
            Ok(_) => {}
            Err(GraphError::InternalConsistency(message)) => {
                log::error!("{}: {}", label, message);
            }
            Err(err) => log::warn!("{} rejected: {}", label, err),
        }
        result
    }

    fn dispatch(&mut self, intent: Intent) -> CommandResult {
        match intent {
            Intent::AddNode(spec) => self.add_node(spec),
            Intent::DeleteNodes(ids) => self.delete(Vec::new(), ids),
            Intent::DeleteEdges(ids) => self.delete(ids, Vec::new()),
            Intent::DeleteSelection => {
                let edges = self.scene.selected_edges();
                let nodes = self.scene.selected_nodes();
                self.delete(edges, nodes)
            }
            Intent::Select { items, extend } => {
                self.scene.select(&items, extend);
                Ok(Outcome::SelectionChanged)
            }
            Intent::ClearSelection => {
                self.scene.clear_selection();
                Ok(Outcome::SelectionChanged)
            }
            Intent::DragNodes { nodes, dx, dy } => self.drag(&nodes, dx, dy),
            Intent::ReleaseDrag => self.release_drag(),
            Intent::CancelDrag => {
                if !self.scene.is_dragging() {
                    return Err(GraphError::NoPendingInteraction);
                }
                self.scene.cancel_preview();
                Ok(Outcome::Cancelled)
            }
            Intent::MoveNode { node, to } => {
                self.require_node(node)?;
                self.commit(format!("Move {}", self.node_name(node)), |g| {
                    g.move_node(node, to)
                })
            }
            Intent::BeginConnect(from) => {
                self.require_connection(from)?;
                self.pending_connect = Some(from);
                Ok(Outcome::Pending)
            }
            Intent::CompleteConnect(to) => {
                let from = self
                    .pending_connect
                    .take()
                    .ok_or(GraphError::NoPendingInteraction)?;
                self.connect(from, to)
            }
            Intent::CancelConnect => {
                self.pending_connect
                    .take()
                    .ok_or(GraphError::NoPendingInteraction)?;
                Ok(Outcome::Cancelled)
            }
            Intent::Connect { source, target } => self.connect(source, target),
            Intent::SetAttribute { node, name, value } => self.set_attribute(node, name, value),
            Intent::RemoveAttribute { node, name } => {
                self.require_node(node)?;
                self.commit(format!("Remove {}", name), |g| {
                    g.remove_attribute(node, &name).map(drop)
                })
            }
            Intent::RenameNode { node, name } => {
                self.require_node(node)?;
                self.commit(format!("Rename to {}", name), |g| g.rename_node(node, &name))
            }
            Intent::Undo => self.undo(),
            Intent::Redo => self.redo(),
        }
    }

    fn add_node(&mut self, spec: NodeSpec) -> CommandResult {
        let label = format!("Add {}", spec.name);
        self.commit(label, |g| g.add_node(spec).map(drop))
    }

    /// Remove edges then nodes (with their remaining edges) as one command.
    fn delete(&mut self, edges: Vec<EdgeId>, nodes: Vec<NodeId>) -> CommandResult {
        let edges: IndexSet<EdgeId> = edges.into_iter().collect();
        let nodes: IndexSet<NodeId> = nodes.into_iter().collect();
        for id in &edges {
            if !self.store().contains_edge(*id) {
                return Err(GraphError::NotFound(ItemRef::Edge(*id)));
            }
        }
        for id in &nodes {
            self.require_node(*id)?;
        }
        // Edges of deleted nodes go with their node.
        let edges: Vec<EdgeId> = edges
            .into_iter()
            .filter(|id| {
                self.store()
                    .edge(*id)
                    .is_some_and(|e| !nodes.iter().any(|n| e.touches_node(*n)))
            })
            .collect();
        let label = match (nodes.len(), edges.len()) {
            (0, 0) => return Ok(Outcome::Nothing),
            (1, 0) => format!("Delete {}", self.node_name(nodes[0])),
            (n, 0) => format!("Delete {} nodes", n),
            (0, e) => format!("Delete {} edge(s)", e),
            (n, e) => format!("Delete {} nodes and {} edge(s)", n, e),
        };
        self.commit(label, move |g| {
            for id in edges {
                g.remove_edge(id)?;
            }
            for id in nodes {
                g.remove_node(id)?;
            }
            Ok(())
        })
    }

    fn drag(&mut self, nodes: &[NodeId], dx: f32, dy: f32) -> CommandResult {
        for id in nodes {
            self.require_node(*id)?;
        }
        if !self.scene.preview_move(nodes, dx, dy) {
            return Err(self.fault_error(ConsistencyFault::new(
                "graphics scene",
                "drag preview for a node without a scene item",
            )));
        }
        Ok(Outcome::Pending)
    }

    fn release_drag(&mut self) -> CommandResult {
        if !self.scene.is_dragging() {
            return Err(GraphError::NoPendingInteraction);
        }
        let moves: Vec<(NodeId, Point)> = self
            .scene
            .end_preview()
            .into_iter()
            .filter(|(_, before, after)| before != after)
            .map(|(id, _, after)| (id, after))
            .collect();
        if moves.is_empty() {
            return Ok(Outcome::Cancelled);
        }
        let label = match moves.as_slice() {
            [(id, _)] => format!("Move {}", self.node_name(*id)),
            many => format!("Move {} nodes", many.len()),
        };
        let result = self.commit(label, |g| {
            for (id, to) in &moves {
                g.move_node(*id, *to)?;
            }
            Ok(())
        });
        if result.is_err() {
            // Previewed items must not outlive a rejected move.
            self.scene.rebuild(self.graph.store());
        }
        result
    }

    /// Validate, normalise and add an edge. A drag that started on an input
    /// is turned around so the edge always runs output → input.
    fn connect(&mut self, from: ConnectionRef, to: ConnectionRef) -> CommandResult {
        let from_dir = self.require_connection(from)?;
        let to_dir = self.require_connection(to)?;
        let (source, target) = match (from_dir, to_dir) {
            (Direction::Input, Direction::Output) => (to, from),
            _ => (from, to),
        };
        self.store().validate_edge(source, target)?;
        let label = format!(
            "Connect {} to {}",
            self.store().connection_label(source),
            self.store().connection_label(target)
        );
        self.commit(label, |g| g.add_edge(source, target).map(drop))
    }

    fn set_attribute(&mut self, node: NodeId, name: String, value: AttrValue) -> CommandResult {
        let existing = self
            .store()
            .node(node)
            .ok_or(GraphError::NotFound(ItemRef::Node(node)))?
            .attributes
            .get(&name);
        if existing == Some(&value) {
            return Ok(Outcome::Nothing);
        }
        self.commit(format!("Set {}", name), |g| g.set_attribute(node, &name, value))
    }

    fn undo(&mut self) -> CommandResult {
        self.abort_interactions();
        let label = self.stack.undo_text().map(str::to_string);
        match (self.stack.undo(&mut self.graph)?, label) {
            (Some(change), Some(label)) => {
                self.fan_out(&change)?;
                Ok(Outcome::Undone { label, change })
            }
            _ => Ok(Outcome::Nothing),
        }
    }

    fn redo(&mut self) -> CommandResult {
        self.abort_interactions();
        let label = self.stack.redo_text().map(str::to_string);
        match (self.stack.redo(&mut self.graph)?, label) {
            (Some(change), Some(label)) => {
                self.fan_out(&change)?;
                Ok(Outcome::Redone { label, change })
            }
            _ => Ok(Outcome::Nothing),
        }
    }

    fn abort_interactions(&mut self) {
        self.pending_connect = None;
        if self.scene.is_dragging() {
            self.scene.cancel_preview();
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Commit and fan-out
    // ────────────────────────────────────────────────────────────────────────

    /// Run `f` as one graph transaction. A non-empty result is pushed as one
    /// command and forwarded to the scene and the views.
    fn commit(
        &mut self,
        label: String,
        f: impl FnOnce(&mut Graph) -> Result<()>,
    ) -> CommandResult {
        self.graph.begin_transaction()?;
        if let Err(err) = f(&mut self.graph) {
            self.graph.rollback_transaction()?;
            return Err(err);
        }
        let change = self.graph.commit_transaction()?;
        if change.is_empty() {
            return Ok(Outcome::Nothing);
        }
        let mutations = change.mutations().to_vec();
        let command = if mutations.iter().all(Mutation::is_property_edit) {
            SceneCommand::Nodes(SceneNodesCommand::new(label.clone(), mutations))
        } else {
            SceneCommand::Changed(SceneChangedCommand::new(label.clone(), mutations))
        };
        self.stack.push(command);
        self.fan_out(&change)?;
        Ok(Outcome::Committed { label, change })
    }

    /// Forward a committed change set to the scene, then every view, and
    /// collect any consistency fault they recorded.
    fn fan_out(&mut self, change: &ChangeSet) -> Result<()> {
        let store = self.graph.store();
        self.scene.on_change(store, change);
        for view in self.views.all_mut() {
            view.on_change(store, change);
        }
        let mut faults: Vec<ConsistencyFault> = self.scene.take_fault().into_iter().collect();
        for view in self.views.all_mut() {
            faults.extend(view.take_fault());
        }
        consistency_error(faults)
    }

    fn fault_error(&self, fault: ConsistencyFault) -> GraphError {
        GraphError::InternalConsistency(fault.to_string())
    }

    // ────────────────────────────────────────────────────────────────────────
    // Lookups
    // ────────────────────────────────────────────────────────────────────────

    fn require_node(&self, id: NodeId) -> Result<()> {
        if self.store().contains_node(id) {
            Ok(())
        } else {
            Err(GraphError::NotFound(ItemRef::Node(id)))
        }
    }

    fn require_connection(&self, cref: ConnectionRef) -> Result<Direction> {
        self.require_node(cref.node)?;
        self.store()
            .connection(cref)
            .map(|c| c.direction)
            .ok_or(GraphError::DanglingConnection(cref))
    }

    fn node_name(&self, id: NodeId) -> String {
        self.store()
            .node(id)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

fn consistency_error(faults: Vec<ConsistencyFault>) -> Result<()> {
    if faults.is_empty() {
        return Ok(());
    }
    let message = faults
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    Err(GraphError::InternalConsistency(message))
}
