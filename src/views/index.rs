//! Ordered id → row mapping shared by the list and table models.

use super::SortPolicy;
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone)]
struct Entry<K> {
    key: K,
    name: String,
}

/// Rows in display order plus a reverse lookup from key to row.
#[derive(Debug, Clone)]
pub(crate) struct RowIndex<K> {
    sort: SortPolicy,
    entries: Vec<Entry<K>>,
    rows: HashMap<K, usize>,
}

impl<K: Copy + Eq + Hash + Ord> RowIndex<K> {
    pub fn new(sort: SortPolicy) -> Self {
        Self {
            sort,
            entries: Vec::new(),
            rows: HashMap::new(),
        }
    }

    pub fn sort(&self) -> SortPolicy {
        self.sort
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn row_of(&self, key: K) -> Option<usize> {
        self.rows.get(&key).copied()
    }

    pub fn key_at(&self, row: usize) -> Option<K> {
        self.entries.get(row).map(|e| e.key)
    }

    pub fn contains(&self, key: K) -> bool {
        self.rows.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.entries.iter().map(|e| e.key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.rows.clear();
    }

    /// Where a new entry goes under the current policy.
    fn slot_for(&self, key: K, name: &str) -> usize {
        match self.sort {
            SortPolicy::None => self.entries.len(),
            SortPolicy::ByCreationOrder => self.entries.partition_point(|e| e.key < key),
            SortPolicy::ByName => self
                .entries
                .partition_point(|e| (e.name.as_str(), e.key) < (name, key)),
        }
    }

    fn reindex_from(&mut self, first: usize) {
        for (row, entry) in self.entries.iter().enumerate().skip(first) {
            self.rows.insert(entry.key, row);
        }
    }

    /// Insert a key and return its row. Returns `None` if already present.
    pub fn insert(&mut self, key: K, name: &str) -> Option<usize> {
        if self.rows.contains_key(&key) {
            return None;
        }
        let row = self.slot_for(key, name);
        self.entries.insert(
            row,
            Entry {
                key,
                name: name.to_string(),
            },
        );
        self.reindex_from(row);
        Some(row)
    }

    /// Remove a key and compact rows. Returns the row it occupied.
    pub fn remove(&mut self, key: K) -> Option<usize> {
        let row = self.rows.remove(&key)?;
        self.entries.remove(row);
        self.reindex_from(row);
        Some(row)
    }

    /// Update the sort name. Returns `(from, to)` rows; they differ only when
    /// the entry had to move to keep the name order.
    pub fn rename(&mut self, key: K, name: &str) -> Option<(usize, usize)> {
        let from = self.row_of(key)?;
        if self.sort != SortPolicy::ByName {
            self.entries[from].name = name.to_string();
            return Some((from, from));
        }
        self.entries.remove(from);
        self.rows.remove(&key);
        let to = self.slot_for(key, name);
        self.entries.insert(
            to,
            Entry {
                key,
                name: name.to_string(),
            },
        );
        self.reindex_from(from.min(to));
        Some((from, to))
    }
}
