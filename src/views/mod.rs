//! Derived, read-only projections of the graph for list and table widgets.
//!
//! Each model listens to graph change sets and patches itself incrementally:
//! adds insert one row at the position dictated by its [`SortPolicy`],
//! removes delete one row, and property edits only touch the affected cell
//! and emit a narrow [`ViewEvent::DataChanged`]. Widgets drain the events
//! with [`ViewModel::take_events`].
//!
//! The models never own graph data. They keep identifiers and cached display
//! fields, so they can always be rebuilt from the store.

mod edges;
mod index;
mod nodes;
mod table;

pub use edges::{EdgeRow, EdgesListModel};
pub use nodes::{NodeRow, NodesListModel};
pub use table::{GraphTableModel, TableColumn};

use crate::graph::{ConsistencyFault, GraphListener, GraphStore};
use serde::{Deserialize, Serialize};

/// Row ordering policy for a view model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortPolicy {
    /// Append in arrival order.
    #[default]
    None,
    /// Ordered by display name, ties broken by id.
    ByName,
    /// Ordered by identifier, which is allocation order.
    ByCreationOrder,
}

/// Change notifications for widgets bound to a view model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEvent {
    RowInserted { row: usize },
    RowRemoved { row: usize },
    RowMoved { from: usize, to: usize },
    /// One cell (or the whole row when `column` is `None`) changed.
    DataChanged { row: usize, column: Option<usize> },
    ColumnInserted { column: usize },
    ColumnRemoved { column: usize },
    /// Everything changed; widgets should re-read the model.
    Reset,
}

/// Common surface of the list and table models.
pub trait ViewModel: GraphListener {
    /// Short name used in logs and consistency faults.
    fn label(&self) -> &'static str;

    fn row_count(&self) -> usize;

    /// Drop all rows and repopulate from the store. Emits [`ViewEvent::Reset`].
    fn rebuild(&mut self, graph: &GraphStore);

    /// Check that rows correspond exactly to live graph entities.
    fn verify(&self, graph: &GraphStore) -> Result<(), ConsistencyFault>;

    /// Pending widget notifications, oldest first.
    fn take_events(&mut self) -> Vec<ViewEvent>;

    /// A fault detected while applying a change set, if any.
    fn take_fault(&mut self) -> Option<ConsistencyFault>;
}

/// The three models the scene handler keeps in sync.
#[derive(Debug)]
pub struct Views {
    pub nodes: NodesListModel,
    pub edges: EdgesListModel,
    pub table: GraphTableModel,
}

impl Views {
    pub fn new(nodes_sort: SortPolicy, edges_sort: SortPolicy, table_sort: SortPolicy) -> Self {
        Self {
            nodes: NodesListModel::new(nodes_sort),
            edges: EdgesListModel::new(edges_sort),
            table: GraphTableModel::new(table_sort),
        }
    }

    pub fn all_mut(&mut self) -> [&mut dyn ViewModel; 3] {
        [&mut self.nodes, &mut self.edges, &mut self.table]
    }

    pub fn all(&self) -> [&dyn ViewModel; 3] {
        [&self.nodes, &self.edges, &self.table]
    }
}

/// Compare a model's row keys against the store's live ids.
pub(crate) fn compare_ids<K: Copy + Eq + std::hash::Hash + std::fmt::Display>(
    observer: &'static str,
    rows: impl Iterator<Item = K>,
    live: impl Iterator<Item = K>,
) -> Result<(), ConsistencyFault> {
    let rows: std::collections::HashSet<K> = rows.collect();
    let live: std::collections::HashSet<K> = live.collect();
    if let Some(orphan) = rows.iter().find(|k| !live.contains(k)) {
        return Err(ConsistencyFault::new(
            observer,
            format!("row for {} has no backing graph entity", orphan),
        ));
    }
    if let Some(missing) = live.iter().find(|k| !rows.contains(k)) {
        return Err(ConsistencyFault::new(
            observer,
            format!("{} has no row", missing),
        ));
    }
    Ok(())
}
