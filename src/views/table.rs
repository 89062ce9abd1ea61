use super::index::RowIndex;
use super::{SortPolicy, ViewEvent, ViewModel, compare_ids};
use crate::graph::{ChangeSet, ConsistencyFault, GraphListener, GraphStore, Mutation};
use crate::model::{AttrValue, Node, NodeId, Point};
use indexmap::IndexMap;
use std::collections::HashMap;

const LABEL: &str = "graph table";

/// A table column header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableColumn {
    Name,
    X,
    Y,
    Attribute(String),
}

impl TableColumn {
    pub fn title(&self) -> &str {
        match self {
            TableColumn::Name => "name",
            TableColumn::X => "x",
            TableColumn::Y => "y",
            TableColumn::Attribute(name) => name,
        }
    }
}

const FIXED_COLUMNS: usize = 3;

#[derive(Debug, Clone)]
struct TableRow {
    name: String,
    position: Point,
    attributes: IndexMap<String, AttrValue>,
    dirty: bool,
}

impl TableRow {
    fn from_node(node: &Node) -> Self {
        Self {
            name: node.name.clone(),
            position: node.position,
            attributes: node.attributes.clone(),
            dirty: false,
        }
    }
}

/// Node-per-row table with one column per attribute name present anywhere
/// in the graph.
///
/// Attribute columns appear in the order their names were first seen and
/// disappear when no node carries the attribute any more.
#[derive(Debug)]
pub struct GraphTableModel {
    index: RowIndex<NodeId>,
    rows: HashMap<NodeId, TableRow>,
    /// Attribute column name → number of nodes carrying it.
    attribute_columns: IndexMap<String, usize>,
    events: Vec<ViewEvent>,
    fault: Option<ConsistencyFault>,
}

impl GraphTableModel {
    pub fn new(sort: SortPolicy) -> Self {
        Self {
            index: RowIndex::new(sort),
            rows: HashMap::new(),
            attribute_columns: IndexMap::new(),
            events: Vec::new(),
            fault: None,
        }
    }

    pub fn column_count(&self) -> usize {
        FIXED_COLUMNS + self.attribute_columns.len()
    }

    pub fn column(&self, column: usize) -> Option<TableColumn> {
        match column {
            0 => Some(TableColumn::Name),
            1 => Some(TableColumn::X),
            2 => Some(TableColumn::Y),
            n => self
                .attribute_columns
                .get_index(n - FIXED_COLUMNS)
                .map(|(name, _)| TableColumn::Attribute(name.clone())),
        }
    }

    pub fn headers(&self) -> Vec<String> {
        (0..self.column_count())
            .filter_map(|c| self.column(c))
            .map(|c| c.title().to_string())
            .collect()
    }

    pub fn attribute_column(&self, name: &str) -> Option<usize> {
        self.attribute_columns
            .get_index_of(name)
            .map(|i| i + FIXED_COLUMNS)
    }

    pub fn node_at(&self, row: usize) -> Option<NodeId> {
        self.index.key_at(row)
    }

    pub fn row_of(&self, id: NodeId) -> Option<usize> {
        self.index.row_of(id)
    }

    /// Display text of a cell; empty for an attribute the node lacks.
    pub fn cell(&self, row: usize, column: usize) -> Option<String> {
        let entry = self.index.key_at(row).and_then(|id| self.rows.get(&id))?;
        let text = match self.column(column)? {
            TableColumn::Name => entry.name.clone(),
            TableColumn::X => format!("{}", entry.position.x),
            TableColumn::Y => format!("{}", entry.position.y),
            TableColumn::Attribute(name) => entry
                .attributes
                .get(&name)
                .map(AttrValue::display_text)
                .unwrap_or_default(),
        };
        Some(text)
    }

    pub fn take_dirty(&mut self) -> Vec<NodeId> {
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

    fn retain_column(&mut self, name: &str) {
        if let Some(count) = self.attribute_columns.get_mut(name) {
            *count += 1;
            return;
        }
        self.attribute_columns.insert(name.to_string(), 1);
        let column = FIXED_COLUMNS + self.attribute_columns.len() - 1;
        self.events.push(ViewEvent::ColumnInserted { column });
    }

    fn release_column(&mut self, name: &str) {
        let Some((i, _, count)) = self.attribute_columns.get_full_mut(name) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.attribute_columns.shift_remove_index(i);
            self.events.push(ViewEvent::ColumnRemoved {
                column: FIXED_COLUMNS + i,
            });
        }
    }

    fn apply(&mut self, mutation: &Mutation) {
        match mutation {
            Mutation::AddNode { node, .. } => {
                let Some(row) = self.index.insert(node.id, &node.name) else {
                    self.fail(format!("{} added twice", node.id));
                    return;
                };
                self.rows.insert(node.id, TableRow::from_node(node));
                self.events.push(ViewEvent::RowInserted { row });
                for name in node.attributes.keys() {
                    self.retain_column(name);
                }
            }
            Mutation::RemoveNode { node, .. } => {
                let Some(row) = self.index.remove(node.id) else {
                    self.fail(format!("removal of {} which has no row", node.id));
                    return;
                };
                self.events.push(ViewEvent::RowRemoved { row });
                if let Some(entry) = self.rows.remove(&node.id) {
                    for name in entry.attributes.keys() {
                        self.release_column(name);
                    }
                }
            }
            Mutation::RenameNode { node, after, .. } => {
                if let Some((from, to)) = self.index.rename(*node, after) {
                    if from != to {
                        self.events.push(ViewEvent::RowMoved { from, to });
                    }
                }
                self.patch(*node, 0, |r| r.name.clone_from(after));
            }
            Mutation::MoveNode { node, before, after } => {
                if before.x != after.x {
                    self.patch(*node, 1, |r| r.position.x = after.x);
                }
                if before.y != after.y {
                    self.patch(*node, 2, |r| r.position.y = after.y);
                }
            }
            Mutation::SetAttribute {
                node,
                name,
                slot,
                after,
                ..
            } => {
                let Some(entry) = self.rows.get_mut(node) else {
                    self.fail(format!("attribute edit for {} which has no row", node));
                    return;
                };
                let had = entry.attributes.contains_key(name);
                match after {
                    Some(value) => {
                        if had {
                            entry.attributes.insert(name.clone(), value.clone());
                        } else {
                            let slot = (*slot).min(entry.attributes.len());
                            entry.attributes.shift_insert(slot, name.clone(), value.clone());
                        }
                    }
                    None => {
                        entry.attributes.shift_remove(name);
                    }
                }
                entry.dirty = true;
                match (had, after.is_some()) {
                    (false, true) => self.retain_column(name),
                    (true, false) => self.release_column(name),
                    _ => {}
                }
                if let (Some(row), Some(column)) =
                    (self.index.row_of(*node), self.attribute_column(name))
                {
                    self.events.push(ViewEvent::DataChanged {
                        row,
                        column: Some(column),
                    });
                } else if let Some(row) = self.index.row_of(*node) {
                    // Column vanished with the attribute; the row still changed.
                    self.events.push(ViewEvent::DataChanged { row, column: None });
                }
            }
            Mutation::AddEdge { .. } | Mutation::RemoveEdge { .. } => {}
        }
    }

    fn patch(&mut self, id: NodeId, column: usize, edit: impl FnOnce(&mut TableRow)) {
        let Some(row) = self.index.row_of(id) else {
            self.fail(format!("edit for {} which has no row", id));
            return;
        };
        let Some(entry) = self.rows.get_mut(&id) else {
            self.fail(format!("edit for {} which has no cached cells", id));
            return;
        };
        edit(entry);
        entry.dirty = true;
        self.events.push(ViewEvent::DataChanged {
            row,
            column: Some(column),
        });
    }
}

impl GraphListener for GraphTableModel {
    fn on_change(&mut self, _graph: &GraphStore, change: &ChangeSet) {
        for mutation in change {
            self.apply(mutation);
        }
    }
}

impl ViewModel for GraphTableModel {
    fn label(&self) -> &'static str {
        LABEL
    }

    fn row_count(&self) -> usize {
        self.index.len()
    }

    fn rebuild(&mut self, graph: &GraphStore) {
        self.index.clear();
        self.rows.clear();
        self.attribute_columns.clear();
        for node in graph.nodes() {
            self.index.insert(node.id, &node.name);
            self.rows.insert(node.id, TableRow::from_node(node));
            for name in node.attributes.keys() {
                *self.attribute_columns.entry(name.clone()).or_insert(0) += 1;
            }
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
