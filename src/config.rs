use serde::{Deserialize, Serialize};

use crate::settings::{SettingValue, Settings};
use crate::views::SortPolicy;

/// Editor behaviour read from the `Preferences` settings group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum number of undo steps kept. Unbounded by default.
    pub history_limit: usize,
    /// Collapse consecutive edits of the same node properties into one undo step.
    pub merge_property_edits: bool,
    pub nodes_sort: SortPolicy,
    pub edges_sort: SortPolicy,
    pub table_sort: SortPolicy,
    pub max_recent_files: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_limit: usize::MAX,
            merge_property_edits: false,
            nodes_sort: SortPolicy::None,
            edges_sort: SortPolicy::None,
            table_sort: SortPolicy::None,
            max_recent_files: 10,
        }
    }
}

impl EditorConfig {
    /// Read every preference, falling back per key to the stored default and
    /// then to [`EditorConfig::default`]. Values of the wrong type are ignored.
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = Self::default();
        let count = |key: &str, fallback: usize| {
            settings
                .preference(key)
                .and_then(SettingValue::as_i64)
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(fallback)
        };
        let sort = |key: &str, fallback: SortPolicy| {
            settings
                .preference(key)
                .and_then(SettingValue::as_str)
                .and_then(|s| serde_json::from_value(serde_json::Value::from(s)).ok())
                .unwrap_or(fallback)
        };
        Self {
            history_limit: count("history_limit", defaults.history_limit),
            merge_property_edits: settings
                .preference("merge_property_edits")
                .and_then(SettingValue::as_bool)
                .unwrap_or(defaults.merge_property_edits),
            nodes_sort: sort("nodes_sort", defaults.nodes_sort),
            edges_sort: sort("edges_sort", defaults.edges_sort),
            table_sort: sort("table_sort", defaults.table_sort),
            max_recent_files: count("max_recent_files", defaults.max_recent_files),
        }
    }

    /// This configuration as `(preference key, value)` pairs.
    pub fn preference_defaults(&self) -> Vec<(&'static str, SettingValue)> {
        vec![
            ("history_limit", count_value(self.history_limit)),
            ("merge_property_edits", SettingValue::Bool(self.merge_property_edits)),
            ("nodes_sort", sort_value(self.nodes_sort)),
            ("edges_sort", sort_value(self.edges_sort)),
            ("table_sort", sort_value(self.table_sort)),
            ("max_recent_files", count_value(self.max_recent_files)),
        ]
    }
}

/// Counts above `i64::MAX` are stored saturated.
fn count_value(count: usize) -> SettingValue {
    SettingValue::Int(i64::try_from(count).unwrap_or(i64::MAX))
}

fn sort_value(sort: SortPolicy) -> SettingValue {
    match sort {
        SortPolicy::None => SettingValue::from("none"),
        SortPolicy::ByName => SettingValue::from("by-name"),
        SortPolicy::ByCreationOrder => SettingValue::from("by-creation-order"),
    }
}
