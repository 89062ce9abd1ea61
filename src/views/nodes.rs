use super::index::RowIndex;
use super::{SortPolicy, ViewEvent, ViewModel, compare_ids};
use crate::graph::{ChangeSet, ConsistencyFault, GraphListener, GraphStore, Mutation};
use crate::model::{Node, NodeId, Point};
use std::collections::HashMap;

const LABEL: &str = "nodes list";

/// Cached display fields of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRow {
    pub id: NodeId,
    pub name: String,
    pub position: Point,
    pub inputs: usize,
    pub outputs: usize,
    pub attributes: usize,
    /// Set by property edits, cleared by [`NodesListModel::take_dirty`].
    pub dirty: bool,
}

impl NodeRow {
    fn from_node(node: &Node) -> Self {
        Self {
            id: node.id,
            name: node.name.clone(),
            position: node.position,
            inputs: node.inputs().count(),
            outputs: node.outputs().count(),
            attributes: node.attributes.len(),
            dirty: false,
        }
    }
}

/// One row per node.
#[derive(Debug)]
pub struct NodesListModel {
    index: RowIndex<NodeId>,
    rows: HashMap<NodeId, NodeRow>,
    events: Vec<ViewEvent>,
    fault: Option<ConsistencyFault>,
}

impl NodesListModel {
    pub const COLUMN_NAME: usize = 0;
    pub const COLUMN_POSITION: usize = 1;
    pub const COLUMN_PORTS: usize = 2;
    pub const COLUMN_ATTRIBUTES: usize = 3;

    pub fn new(sort: SortPolicy) -> Self {
        Self {
            index: RowIndex::new(sort),
            rows: HashMap::new(),
            events: Vec::new(),
            fault: None,
        }
    }

    pub fn sort(&self) -> SortPolicy {
        self.index.sort()
    }

    pub fn row(&self, row: usize) -> Option<&NodeRow> {
        self.index.key_at(row).and_then(|id| self.rows.get(&id))
    }

    pub fn row_of(&self, id: NodeId) -> Option<usize> {
        self.index.row_of(id)
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.index.keys().collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.index
            .keys()
            .filter_map(|id| self.rows.get(&id))
            .map(|r| r.name.as_str())
            .collect()
    }

    /// Ids of rows edited since the last call, clearing their dirty flag.
    pub fn take_dirty(&mut self) -> Vec<NodeId> {
        let mut dirty: Vec<NodeId> = Vec::new();
        for id in self.index.keys() {
            if let Some(row) = self.rows.get_mut(&id) {
                if row.dirty {
                    row.dirty = false;
                    dirty.push(id);
                }
            }
        }
        dirty
    }

    fn fail(&mut self, message: String) {
        log::error!("{}: {}", LABEL, message);
        self.fault.get_or_insert(ConsistencyFault::new(LABEL, message));
    }

    fn patch(&mut self, id: NodeId, column: usize, edit: impl FnOnce(&mut NodeRow)) {
        let (Some(row), Some(entry)) = (self.index.row_of(id), self.rows.get_mut(&id)) else {
            self.fail(format!("edit for {} which has no row", id));
            return;
        };
        edit(entry);
        entry.dirty = true;
        self.events.push(ViewEvent::DataChanged {
            row,
            column: Some(column),
        });
    }

    fn apply(&mut self, mutation: &Mutation) {
        match mutation {
            Mutation::AddNode { node, .. } => match self.index.insert(node.id, &node.name) {
                Some(row) => {
                    self.rows.insert(node.id, NodeRow::from_node(node));
                    self.events.push(ViewEvent::RowInserted { row });
                }
                None => self.fail(format!("{} added twice", node.id)),
            },
            Mutation::RemoveNode { node, .. } => match self.index.remove(node.id) {
                Some(row) => {
                    self.rows.remove(&node.id);
                    self.events.push(ViewEvent::RowRemoved { row });
                }
                None => self.fail(format!("removal of {} which has no row", node.id)),
            },
            Mutation::RenameNode { node, after, .. } => {
                if let Some((from, to)) = self.index.rename(*node, after) {
                    if from != to {
                        self.events.push(ViewEvent::RowMoved { from, to });
                    }
                }
                self.patch(*node, Self::COLUMN_NAME, |r| r.name.clone_from(after));
            }
            Mutation::MoveNode { node, after, .. } => {
                self.patch(*node, Self::COLUMN_POSITION, |r| r.position = *after);
            }
            Mutation::SetAttribute {
                node, before, after, ..
            } => {
                let delta: isize = match (before, after) {
                    (None, Some(_)) => 1,
                    (Some(_), None) => -1,
                    _ => 0,
                };
                self.patch(*node, Self::COLUMN_ATTRIBUTES, |r| {
                    r.attributes = r.attributes.saturating_add_signed(delta);
                });
            }
            Mutation::AddEdge { .. } | Mutation::RemoveEdge { .. } => {}
        }
    }
}

impl GraphListener for NodesListModel {
    fn on_change(&mut self, _graph: &GraphStore, change: &ChangeSet) {
        for mutation in change {
            self.apply(mutation);
        }
    }
}

impl ViewModel for NodesListModel {
    fn label(&self) -> &'static str {
        LABEL
    }

    fn row_count(&self) -> usize {
        self.index.len()
    }

    fn rebuild(&mut self, graph: &GraphStore) {
        self.index.clear();
        self.rows.clear();
        for node in graph.nodes() {
            self.index.insert(node.id, &node.name);
            self.rows.insert(node.id, NodeRow::from_node(node));
        }
        self.events.clear();
        self.events.push(ViewEvent::Reset);
    }

    fn verify(&self, graph: &GraphStore) -> Result<(), ConsistencyFault> {
        compare_ids(LABEL, self.index.keys(), graph.node_ids())
    }

    fn take_events(&mut self) -> Vec<ViewEvent> {
        std::mem::take(&mut self.events)
    }

    fn take_fault(&mut self) -> Option<ConsistencyFault> {
        self.fault.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::model::NodeSpec;

    fn graph_with(names: &[&str]) -> (Graph, Vec<NodeId>) {
        let mut graph = Graph::new();
        let ids = names
            .iter()
            .map(|name| graph.add_node(NodeSpec::new(*name, Point::default())).unwrap())
            .collect();
        (graph, ids)
    }

    #[test]
    fn test_removal_without_row_is_a_fault() {
        let (graph, ids) = graph_with(&["A"]);
        let node = graph.store().node(ids[0]).unwrap().clone();
        let mut model = NodesListModel::new(SortPolicy::None);

        model.on_change(
            &GraphStore::default(),
            &ChangeSet::new(vec![Mutation::RemoveNode { index: 0, node }]),
        );
        let fault = model.take_fault().unwrap();
        assert_eq!(fault.observer, LABEL);
        assert!(model.take_fault().is_none());
        assert!(model.take_events().is_empty());
    }

    #[test]
    fn test_property_edit_without_row_is_a_fault() {
        let mut model = NodesListModel::new(SortPolicy::None);
        let change = ChangeSet::new(vec![Mutation::MoveNode {
            node: NodeId(7),
            before: Point::default(),
            after: Point::new(1.0, 1.0),
        }]);
        model.on_change(&GraphStore::default(), &change);
        assert!(model.take_fault().is_some());
    }

    #[test]
    fn test_first_fault_is_kept() {
        let (graph, ids) = graph_with(&["A"]);
        let node = graph.store().node(ids[0]).unwrap().clone();
        let mut model = NodesListModel::new(SortPolicy::None);
        model.rebuild(graph.store());

        let twice = ChangeSet::new(vec![
            Mutation::AddNode { index: 0, node: node.clone() },
            Mutation::RenameNode { node: NodeId(9), before: "X".into(), after: "Y".into() },
        ]);
        model.on_change(graph.store(), &twice);
        assert!(model.take_fault().unwrap().message.contains("added twice"));
    }

    #[test]
    fn test_verify_reports_missing_and_orphan_rows() {
        let (mut graph, ids) = graph_with(&["A", "B"]);
        let mut model = NodesListModel::new(SortPolicy::None);
        // Not subscribed, so the model misses every later change.
        let missing = model.verify(graph.store()).unwrap_err();
        assert!(missing.message.ends_with("has no row"));

        model.rebuild(graph.store());
        assert_eq!(model.verify(graph.store()), Ok(()));

        graph.remove_node(ids[1]).unwrap();
        let orphan = model.verify(graph.store()).unwrap_err();
        assert_eq!(orphan.observer, LABEL);
        assert!(orphan.message.contains("no backing graph entity"));
    }
}
