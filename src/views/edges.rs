use super::index::RowIndex;
use super::{SortPolicy, ViewEvent, ViewModel, compare_ids};
use crate::graph::{ChangeSet, ConsistencyFault, GraphListener, GraphStore, Mutation};
use crate::model::{ConnectionRef, Edge, EdgeId, NodeId};
use std::collections::HashMap;

const LABEL: &str = "edges list";

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRow {
    pub id: EdgeId,
    pub source: ConnectionRef,
    pub target: ConnectionRef,
    /// `Node.port` of the source.
    pub source_label: String,
    pub target_label: String,
    pub dirty: bool,
}

impl EdgeRow {
    fn new(edge: &Edge, graph: &GraphStore) -> Self {
        Self {
            id: edge.id,
            source: edge.source,
            target: edge.target,
            source_label: graph.connection_label(edge.source),
            target_label: graph.connection_label(edge.target),
            dirty: false,
        }
    }

    pub fn label(&self) -> String {
        format!("{} -> {}", self.source_label, self.target_label)
    }

    pub fn touches(&self, node: NodeId) -> bool {
        self.source.node == node || self.target.node == node
    }
}

/// One row per edge, labelled `Source.port -> Target.port`.
#[derive(Debug)]
pub struct EdgesListModel {
    index: RowIndex<EdgeId>,
    rows: HashMap<EdgeId, EdgeRow>,
    events: Vec<ViewEvent>,
    fault: Option<ConsistencyFault>,
}

impl EdgesListModel {
    pub const COLUMN_SOURCE: usize = 0;
    pub const COLUMN_TARGET: usize = 1;

    pub fn new(sort: SortPolicy) -> Self {
        Self {
            index: RowIndex::new(sort),
            rows: HashMap::new(),
            events: Vec::new(),
            fault: None,
        }
    }

    pub fn row(&self, row: usize) -> Option<&EdgeRow> {
        self.index.key_at(row).and_then(|id| self.rows.get(&id))
    }

    pub fn row_of(&self, id: EdgeId) -> Option<usize> {
        self.index.row_of(id)
    }

    pub fn ids(&self) -> Vec<EdgeId> {
        self.index.keys().collect()
    }

    pub fn labels(&self) -> Vec<String> {
        self.index
            .keys()
            .filter_map(|id| self.rows.get(&id))
            .map(EdgeRow::label)
            .collect()
    }

    pub fn take_dirty(&mut self) -> Vec<EdgeId> {
        let mut dirty = Vec::new();
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

    /// Refresh the labels of every edge attached to a renamed node.
    fn relabel(&mut self, node: NodeId, graph: &GraphStore) {
        let touching: Vec<EdgeId> = self
            .index
            .keys()
            .filter(|id| self.rows.get(id).is_some_and(|r| r.touches(node)))
            .collect();
        for id in touching {
            let Some(entry) = self.rows.get_mut(&id) else {
                continue;
            };
            let mut columns = Vec::new();
            if entry.source.node == node {
                entry.source_label = graph.connection_label(entry.source);
                columns.push(Self::COLUMN_SOURCE);
            }
            if entry.target.node == node {
                entry.target_label = graph.connection_label(entry.target);
                columns.push(Self::COLUMN_TARGET);
            }
            entry.dirty = true;
            let label = entry.label();
            if let Some((from, to)) = self.index.rename(id, &label) {
                if from != to {
                    self.events.push(ViewEvent::RowMoved { from, to });
                }
                for column in columns {
                    self.events.push(ViewEvent::DataChanged {
                        row: to,
                        column: Some(column),
                    });
                }
            }
        }
    }

    fn apply(&mut self, mutation: &Mutation, graph: &GraphStore) {
        match mutation {
            Mutation::AddEdge { edge, .. } => {
                let row = EdgeRow::new(edge, graph);
                match self.index.insert(edge.id, &row.label()) {
                    Some(at) => {
                        self.rows.insert(edge.id, row);
                        self.events.push(ViewEvent::RowInserted { row: at });
                    }
                    None => self.fail(format!("{} added twice", edge.id)),
                }
            }
            Mutation::RemoveEdge { edge, .. } => match self.index.remove(edge.id) {
                Some(row) => {
                    self.rows.remove(&edge.id);
                    self.events.push(ViewEvent::RowRemoved { row });
                }
                None => self.fail(format!("removal of {} which has no row", edge.id)),
            },
            Mutation::RenameNode { node, .. } => self.relabel(*node, graph),
            Mutation::AddNode { .. }
            | Mutation::RemoveNode { .. }
            | Mutation::MoveNode { .. }
            | Mutation::SetAttribute { .. } => {}
        }
    }
}

impl GraphListener for EdgesListModel {
    fn on_change(&mut self, graph: &GraphStore, change: &ChangeSet) {
        for mutation in change {
            self.apply(mutation, graph);
        }
    }
}

impl ViewModel for EdgesListModel {
    fn label(&self) -> &'static str {
        LABEL
    }

    fn row_count(&self) -> usize {
        self.index.len()
    }

    fn rebuild(&mut self, graph: &GraphStore) {
        self.index.clear();
        self.rows.clear();
        for edge in graph.edges() {
            let row = EdgeRow::new(edge, graph);
            self.index.insert(edge.id, &row.label());
            self.rows.insert(edge.id, row);
        }
        self.events.clear();
        self.events.push(ViewEvent::Reset);
    }

    fn verify(&self, graph: &GraphStore) -> Result<(), ConsistencyFault> {
        compare_ids(LABEL, self.index.keys(), graph.edge_ids())
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
    use crate::model::{NodeSpec, Point};

    fn connected() -> (Graph, EdgeId) {
        let mut graph = Graph::new();
        let a = graph
            .add_node(NodeSpec::new("A", Point::default()).with_output("out1"))
            .unwrap();
        let b = graph
            .add_node(NodeSpec::new("B", Point::default()).with_input("in1"))
            .unwrap();
        let out1 = graph.store().node(a).unwrap().port("out1").unwrap();
        let in1 = graph.store().node(b).unwrap().port("in1").unwrap();
        let edge = graph.add_edge(out1, in1).unwrap();
        (graph, edge)
    }

    #[test]
    fn test_removal_of_unknown_edge_is_a_fault() {
        let (graph, id) = connected();
        let edge = *graph.store().edge(id).unwrap();
        let mut model = EdgesListModel::new(SortPolicy::None);

        model.on_change(
            graph.store(),
            &ChangeSet::new(vec![Mutation::RemoveEdge { index: 0, edge }]),
        );
        let fault = model.take_fault().unwrap();
        assert_eq!(fault.observer, LABEL);
        assert!(fault.message.contains("which has no row"));
        assert_eq!(model.row_count(), 0);
    }

    #[test]
    fn test_duplicate_add_is_a_fault() {
        let (graph, id) = connected();
        let edge = *graph.store().edge(id).unwrap();
        let mut model = EdgesListModel::new(SortPolicy::None);
        model.rebuild(graph.store());

        model.on_change(
            graph.store(),
            &ChangeSet::new(vec![Mutation::AddEdge { index: 1, edge }]),
        );
        assert!(model.take_fault().unwrap().message.contains("added twice"));
        assert_eq!(model.row_count(), 1);
    }

    #[test]
    fn test_verify_reports_missing_and_orphan_rows() {
        let (mut graph, id) = connected();
        let mut model = EdgesListModel::new(SortPolicy::None);
        assert!(model.verify(graph.store()).is_err());

        model.rebuild(graph.store());
        assert_eq!(model.verify(graph.store()), Ok(()));
        assert_eq!(model.labels(), vec!["A.out1 -> B.in1".to_string()]);

        graph.remove_edge(id).unwrap();
        let orphan = model.verify(graph.store()).unwrap_err();
        assert!(orphan.message.contains(&id.to_string()));
    }
}
