//! Graphics scene: one item per graph entity, keyed by the graph's ids.
//!
//! The scene holds only what the drawing layer needs (positions, labels,
//! port anchors, selection) and tells it what to redraw through
//! [`SceneDirective`]s. Items are created, updated and removed exclusively in
//! response to graph change sets, except for drag previews which move items
//! without touching the graph until the drag is committed.

use crate::graph::{ChangeSet, ConsistencyFault, GraphListener, GraphStore, Mutation};
use crate::model::{ConnectionRef, Direction, EdgeId, Node, NodeId, Point, PortId};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const LABEL: &str = "graphics scene";

/// Default node box size in scene units.
pub const NODE_WIDTH: f32 = 150.0;
pub const NODE_HEIGHT: f32 = 60.0;

// ────────────────────────────────────────────────────────────────────────────
// Items
// ────────────────────────────────────────────────────────────────────────────

/// Selectable scene item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SceneItemId {
    Node(NodeId),
    Edge(EdgeId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionItem {
    pub port: PortId,
    pub name: String,
    pub direction: Direction,
    /// Anchor point in scene coordinates, where edges attach.
    pub anchor: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeItem {
    pub id: NodeId,
    pub label: String,
    /// Top-left corner.
    pub position: Point,
    pub connections: Vec<ConnectionItem>,
}

impl NodeItem {
    fn from_node(node: &Node) -> Self {
        let mut item = Self {
            id: node.id,
            label: node.name.clone(),
            position: node.position,
            connections: node
                .connections
                .iter()
                .map(|c| ConnectionItem {
                    port: c.id,
                    name: c.name.clone(),
                    direction: c.direction,
                    anchor: Point::default(),
                })
                .collect(),
        };
        item.layout_ports();
        item
    }

    /// Place inputs along the left edge and outputs along the right edge,
    /// evenly spaced.
    fn layout_ports(&mut self) {
        let n_in = self.connections.iter().filter(|c| c.direction == Direction::Input).count();
        let n_out = self.connections.len() - n_in;
        let (mut i_in, mut i_out) = (0, 0);
        let Point { x: l, y: t } = self.position;
        for conn in &mut self.connections {
            let (index, count, x) = match conn.direction {
                Direction::Input => {
                    i_in += 1;
                    (i_in, n_in, l)
                }
                Direction::Output => {
                    i_out += 1;
                    (i_out, n_out, l + NODE_WIDTH)
                }
            };
            let segments = (count * 2 + 1) as f32;
            let dy = NODE_HEIGHT / segments;
            conn.anchor = Point::new(x, t + (2 * index) as f32 * dy - 0.5 * dy);
        }
    }

    pub fn anchor(&self, port: PortId) -> Option<Point> {
        self.connections
            .iter()
            .find(|c| c.port == port)
            .map(|c| c.anchor)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.position.x
            && p.x <= self.position.x + NODE_WIDTH
            && p.y >= self.position.y
            && p.y <= self.position.y + NODE_HEIGHT
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeItem {
    pub id: EdgeId,
    pub source: ConnectionRef,
    pub target: ConnectionRef,
    pub from: Point,
    pub to: Point,
}

/// Instruction for the drawing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneDirective {
    CreateNode(NodeId),
    UpdateNode(NodeId),
    RemoveNode(NodeId),
    CreateEdge(EdgeId),
    UpdateEdge(EdgeId),
    RemoveEdge(EdgeId),
    SelectionChanged,
    /// Drop every item and redraw from scratch.
    Reset,
}

// ────────────────────────────────────────────────────────────────────────────
// Scene
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct GraphicsScene {
    nodes: IndexMap<NodeId, NodeItem>,
    edges: IndexMap<EdgeId, EdgeItem>,
    selection: IndexSet<SceneItemId>,
    /// Committed positions of nodes currently being drag-previewed.
    drag_origin: HashMap<NodeId, Point>,
    directives: Vec<SceneDirective>,
    fault: Option<ConsistencyFault>,
}

impl GraphicsScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_item(&self, id: NodeId) -> Option<&NodeItem> {
        self.nodes.get(&id)
    }

    pub fn edge_item(&self, id: EdgeId) -> Option<&EdgeItem> {
        self.edges.get(&id)
    }

    pub fn node_items(&self) -> impl Iterator<Item = &NodeItem> {
        self.nodes.values()
    }

    pub fn edge_items(&self) -> impl Iterator<Item = &EdgeItem> {
        self.edges.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Pending directives for the drawing layer, oldest first.
    pub fn drain_directives(&mut self) -> Vec<SceneDirective> {
        std::mem::take(&mut self.directives)
    }

    pub fn take_fault(&mut self) -> Option<ConsistencyFault> {
        self.fault.take()
    }

    fn fail(&mut self, message: String) {
        log::error!("{}: {}", LABEL, message);
        self.fault.get_or_insert(ConsistencyFault::new(LABEL, message));
    }

    // ── selection ──────────────────────────────────────────────────────────

    pub fn selection(&self) -> Vec<SceneItemId> {
        self.selection.iter().copied().collect()
    }

    pub fn selected_nodes(&self) -> Vec<NodeId> {
        self.selection
            .iter()
            .filter_map(|s| match s {
                SceneItemId::Node(id) => Some(*id),
                SceneItemId::Edge(_) => None,
            })
            .collect()
    }

    pub fn selected_edges(&self) -> Vec<EdgeId> {
        self.selection
            .iter()
            .filter_map(|s| match s {
                SceneItemId::Edge(id) => Some(*id),
                SceneItemId::Node(_) => None,
            })
            .collect()
    }

    pub fn is_selected(&self, item: SceneItemId) -> bool {
        self.selection.contains(&item)
    }

    /// Replace (or extend, when `extend` is set) the selection. Unknown ids
    /// are ignored.
    pub fn select(&mut self, items: &[SceneItemId], extend: bool) {
        let before = self.selection.clone();
        if !extend {
            self.selection.clear();
        }
        for item in items {
            let known = match item {
                SceneItemId::Node(id) => self.nodes.contains_key(id),
                SceneItemId::Edge(id) => self.edges.contains_key(id),
            };
            if known {
                self.selection.insert(*item);
            }
        }
        if self.selection != before {
            self.directives.push(SceneDirective::SelectionChanged);
        }
    }

    pub fn clear_selection(&mut self) {
        if !self.selection.is_empty() {
            self.selection.clear();
            self.directives.push(SceneDirective::SelectionChanged);
        }
    }

    fn deselect(&mut self, item: SceneItemId) {
        if self.selection.shift_remove(&item) {
            self.directives.push(SceneDirective::SelectionChanged);
        }
    }

    // ── hit testing ────────────────────────────────────────────────────────

    /// Topmost node whose box contains `p`.
    pub fn node_at(&self, p: Point) -> Option<NodeId> {
        self.nodes
            .values()
            .rev()
            .find(|n| n.contains(p))
            .map(|n| n.id)
    }

    /// Nearest port anchor within `radius` of `p`.
    pub fn port_at(&self, p: Point, radius: f32) -> Option<ConnectionRef> {
        let mut best: Option<(ConnectionRef, f32)> = None;
        for node in self.nodes.values() {
            for conn in &node.connections {
                let d = ((conn.anchor.x - p.x).powi(2) + (conn.anchor.y - p.y).powi(2)).sqrt();
                if d <= radius && best.is_none_or(|(_, bd)| d < bd) {
                    best = Some((ConnectionRef::new(node.id, conn.port), d));
                }
            }
        }
        best.map(|(c, _)| c)
    }

    // ── drag preview ───────────────────────────────────────────────────────

    pub fn is_dragging(&self) -> bool {
        !self.drag_origin.is_empty()
    }

    /// Move items by `(dx, dy)` relative to their committed position,
    /// without touching the graph. Returns false if a node is unknown.
    pub fn preview_move(&mut self, nodes: &[NodeId], dx: f32, dy: f32) -> bool {
        if nodes.iter().any(|id| !self.nodes.contains_key(id)) {
            return false;
        }
        for id in nodes {
            let Some(item) = self.nodes.get_mut(id) else {
                continue;
            };
            let origin = *self.drag_origin.entry(*id).or_insert(item.position);
            item.position = origin.offset(dx, dy);
            item.layout_ports();
            self.directives.push(SceneDirective::UpdateNode(*id));
        }
        self.refresh_edges_of(nodes);
        true
    }

    /// Finish a preview: `(node, committed position, previewed position)` for
    /// every moved node. Items keep their previewed position; the graph
    /// commit that follows confirms it.
    pub fn end_preview(&mut self) -> Vec<(NodeId, Point, Point)> {
        let mut moves: Vec<(NodeId, Point, Point)> = self
            .drag_origin
            .drain()
            .filter_map(|(id, origin)| self.nodes.get(&id).map(|n| (id, origin, n.position)))
            .collect();
        moves.sort_by_key(|(id, _, _)| *id);
        moves
    }

    /// Abort a preview and put every item back where the graph has it.
    pub fn cancel_preview(&mut self) {
        let moved: Vec<(NodeId, Point)> = self.drag_origin.drain().collect();
        let ids: Vec<NodeId> = moved.iter().map(|(id, _)| *id).collect();
        for (id, origin) in moved {
            if let Some(item) = self.nodes.get_mut(&id) {
                item.position = origin;
                item.layout_ports();
                self.directives.push(SceneDirective::UpdateNode(id));
            }
        }
        self.refresh_edges_of(&ids);
    }

    // ── synchronisation ────────────────────────────────────────────────────

    fn endpoint(&self, cref: ConnectionRef, graph: &GraphStore) -> Point {
        if let Some(anchor) = self.nodes.get(&cref.node).and_then(|n| n.anchor(cref.port)) {
            return anchor;
        }
        graph
            .node(cref.node)
            .map(NodeItem::from_node)
            .and_then(|n| n.anchor(cref.port))
            .unwrap_or_default()
    }

    fn refresh_edges_of(&mut self, nodes: &[NodeId]) {
        let touching: Vec<EdgeId> = self
            .edges
            .values()
            .filter(|e| nodes.contains(&e.source.node) || nodes.contains(&e.target.node))
            .map(|e| e.id)
            .collect();
        for id in touching {
            let Some(edge) = self.edges.get(&id) else {
                continue;
            };
            let from = self.nodes.get(&edge.source.node).and_then(|n| n.anchor(edge.source.port));
            let to = self.nodes.get(&edge.target.node).and_then(|n| n.anchor(edge.target.port));
            if let Some(edge) = self.edges.get_mut(&id) {
                if let Some(p) = from {
                    edge.from = p;
                }
                if let Some(p) = to {
                    edge.to = p;
                }
                self.directives.push(SceneDirective::UpdateEdge(id));
            }
        }
    }

    fn apply(&mut self, mutation: &Mutation, graph: &GraphStore) {
        match mutation {
            Mutation::AddNode { node, .. } => {
                if self.nodes.contains_key(&node.id) {
                    self.fail(format!("item for {} created twice", node.id));
                    return;
                }
                self.nodes.insert(node.id, NodeItem::from_node(node));
                self.directives.push(SceneDirective::CreateNode(node.id));
            }
            Mutation::RemoveNode { node, .. } => {
                if self.nodes.shift_remove(&node.id).is_none() {
                    self.fail(format!("removal of {} which has no item", node.id));
                    return;
                }
                self.drag_origin.remove(&node.id);
                self.deselect(SceneItemId::Node(node.id));
                self.directives.push(SceneDirective::RemoveNode(node.id));
            }
            Mutation::AddEdge { edge, .. } => {
                if self.edges.contains_key(&edge.id) {
                    self.fail(format!("item for {} created twice", edge.id));
                    return;
                }
                let item = EdgeItem {
                    id: edge.id,
                    source: edge.source,
                    target: edge.target,
                    from: self.endpoint(edge.source, graph),
                    to: self.endpoint(edge.target, graph),
                };
                self.edges.insert(edge.id, item);
                self.directives.push(SceneDirective::CreateEdge(edge.id));
            }
            Mutation::RemoveEdge { edge, .. } => {
                if self.edges.shift_remove(&edge.id).is_none() {
                    self.fail(format!("removal of {} which has no item", edge.id));
                    return;
                }
                self.deselect(SceneItemId::Edge(edge.id));
                self.directives.push(SceneDirective::RemoveEdge(edge.id));
            }
            Mutation::MoveNode { node, after, .. } => {
                let Some(item) = self.nodes.get_mut(node) else {
                    self.fail(format!("move of {} which has no item", node));
                    return;
                };
                item.position = *after;
                item.layout_ports();
                self.drag_origin.remove(node);
                self.directives.push(SceneDirective::UpdateNode(*node));
                self.refresh_edges_of(&[*node]);
            }
            Mutation::RenameNode { node, after, .. } => {
                let Some(item) = self.nodes.get_mut(node) else {
                    self.fail(format!("rename of {} which has no item", node));
                    return;
                };
                item.label.clone_from(after);
                self.directives.push(SceneDirective::UpdateNode(*node));
            }
            Mutation::SetAttribute { node, .. } => {
                if !self.nodes.contains_key(node) {
                    self.fail(format!("attribute edit of {} which has no item", node));
                    return;
                }
                self.directives.push(SceneDirective::UpdateNode(*node));
            }
        }
    }

    /// Recreate every item from the store and clear selection and previews.
    pub fn rebuild(&mut self, graph: &GraphStore) {
        self.nodes = graph
            .nodes()
            .map(|n| (n.id, NodeItem::from_node(n)))
            .collect();
        self.edges = IndexMap::new();
        for edge in graph.edges() {
            let item = EdgeItem {
                id: edge.id,
                source: edge.source,
                target: edge.target,
                from: self.endpoint(edge.source, graph),
                to: self.endpoint(edge.target, graph),
            };
            self.edges.insert(edge.id, item);
        }
        self.selection.clear();
        self.drag_origin.clear();
        self.directives.clear();
        self.directives.push(SceneDirective::Reset);
    }

    /// Check that items correspond exactly to live graph entities and sit
    /// where the graph says (ignoring nodes under an active drag preview).
    pub fn verify(&self, graph: &GraphStore) -> Result<(), ConsistencyFault> {
        crate::views::compare_ids(LABEL, self.nodes.keys().copied(), graph.node_ids())?;
        crate::views::compare_ids(LABEL, self.edges.keys().copied(), graph.edge_ids())?;
        for item in self.nodes.values() {
            if self.drag_origin.contains_key(&item.id) {
                continue;
            }
            if let Some(node) = graph.node(item.id) {
                if node.position != item.position || node.name != item.label {
                    return Err(ConsistencyFault::new(
                        LABEL,
                        format!("item for {} is out of date", item.id),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl GraphListener for GraphicsScene {
    fn on_change(&mut self, graph: &GraphStore, change: &ChangeSet) {
        for mutation in change {
            self.apply(mutation, graph);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::model::NodeSpec;

    fn scene_with_pair() -> (Graph, GraphicsScene, ConnectionRef, ConnectionRef) {
        let mut graph = Graph::new();
        let mut scene = GraphicsScene::new();
        graph.begin_transaction().unwrap();
        let a = graph
            .add_node(NodeSpec::new("A", Point::new(0.0, 0.0)).with_output("out1"))
            .unwrap();
        let b = graph
            .add_node(NodeSpec::new("B", Point::new(300.0, 0.0)).with_input("in1"))
            .unwrap();
        let out1 = graph.store().node(a).unwrap().port("out1").unwrap();
        let in1 = graph.store().node(b).unwrap().port("in1").unwrap();
        graph.add_edge(out1, in1).unwrap();
        let change = graph.commit_transaction().unwrap();
        scene.on_change(graph.store(), &change);
        (graph, scene, out1, in1)
    }

    #[test]
    fn test_ports_anchor_on_box_edges() {
        let (_graph, scene, out1, in1) = scene_with_pair();
        let a = scene.node_item(out1.node).unwrap();
        let b = scene.node_item(in1.node).unwrap();
        assert_eq!(a.anchor(out1.port).unwrap().x, NODE_WIDTH);
        assert_eq!(b.anchor(in1.port).unwrap().x, 300.0);
        assert_eq!(a.anchor(out1.port).unwrap().y, NODE_HEIGHT / 2.0);
    }

    #[test]
    fn test_preview_moves_edges_without_touching_graph() {
        let (graph, mut scene, out1, _in1) = scene_with_pair();
        scene.drain_directives();
        assert!(scene.preview_move(&[out1.node], 10.0, 20.0));
        let edge = scene.edge_items().next().unwrap();
        assert_eq!(edge.from, Point::new(NODE_WIDTH + 10.0, NODE_HEIGHT / 2.0 + 20.0));
        assert_eq!(graph.store().node(out1.node).unwrap().position, Point::new(0.0, 0.0));
        assert!(scene.verify(graph.store()).is_ok());

        scene.cancel_preview();
        let edge = scene.edge_items().next().unwrap();
        assert_eq!(edge.from, Point::new(NODE_WIDTH, NODE_HEIGHT / 2.0));
        assert!(!scene.is_dragging());
    }

    #[test]
    fn test_port_hit_testing() {
        let (_graph, scene, out1, in1) = scene_with_pair();
        let near_out = Point::new(NODE_WIDTH + 2.0, NODE_HEIGHT / 2.0);
        assert_eq!(scene.port_at(near_out, 5.0), Some(out1));
        assert_eq!(scene.port_at(Point::new(301.0, 31.0), 5.0), Some(in1));
        assert_eq!(scene.port_at(Point::new(500.0, 500.0), 5.0), None);
        assert_eq!(scene.node_at(Point::new(10.0, 10.0)), Some(out1.node));
    }

    #[test]
    fn test_removed_items_leave_selection() {
        let (mut graph, mut scene, out1, _in1) = scene_with_pair();
        scene.select(&[SceneItemId::Node(out1.node)], false);
        let edge = graph.store().edge_ids().next().unwrap();
        scene.select(&[SceneItemId::Edge(edge)], true);
        assert_eq!(scene.selection().len(), 2);

        graph.begin_transaction().unwrap();
        graph.remove_node(out1.node).unwrap();
        let change = graph.commit_transaction().unwrap();
        scene.on_change(graph.store(), &change);

        assert!(scene.selection().is_empty());
        assert!(scene.verify(graph.store()).is_ok());
    }
}
