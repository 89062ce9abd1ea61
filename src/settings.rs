//! Persistent application settings.
//!
//! Values live under flat `/`-separated keys (`MainWindow/geometry/default`,
//! `RecentFiles/1/file`) and are stored as one JSON object on disk. Arrays use
//! a `<name>/size` key plus 1-based `<name>/<i>/<field>` records.
//!
//! Settings are constructed explicitly by the application root with
//! [`Settings::load_or_default`] and written back with [`Settings::flush`].

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::EditorConfig;

pub const MAIN_WINDOW: &str = "MainWindow";
pub const RECENT_FILES: &str = "RecentFiles";
pub const PREFERENCES: &str = "Preferences";
pub const DEFAULT_LAYOUT: &str = "default";

/// One stored value. Window geometry and state are opaque byte blobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl SettingValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SettingValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SettingValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl From<bool> for SettingValue {
    fn from(v: bool) -> Self {
        SettingValue::Bool(v)
    }
}

impl From<i64> for SettingValue {
    fn from(v: i64) -> Self {
        SettingValue::Int(v)
    }
}

impl From<f64> for SettingValue {
    fn from(v: f64) -> Self {
        SettingValue::Float(v)
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        SettingValue::String(v.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(v: String) -> Self {
        SettingValue::String(v)
    }
}

impl From<Vec<u8>> for SettingValue {
    fn from(v: Vec<u8>) -> Self {
        SettingValue::Bytes(v)
    }
}

/// One record of a settings array.
pub type SettingRecord = BTreeMap<String, SettingValue>;

/// The window layer whose geometry, state and docks make up a layout.
pub trait WindowHost {
    fn save_geometry(&self) -> Vec<u8>;
    fn save_state(&self) -> Vec<u8>;
    fn restore_geometry(&mut self, data: &[u8]) -> bool;
    fn restore_state(&mut self, data: &[u8]) -> bool;
    /// Object names of the dock widgets, used as settings groups.
    fn dock_names(&self) -> Vec<String>;
    fn save_dock_geometry(&self, dock: &str) -> Option<Vec<u8>>;
    fn restore_dock_geometry(&mut self, dock: &str, data: &[u8]) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    path: Utf8PathBuf,
    values: BTreeMap<String, SettingValue>,
    max_files: usize,
}

impl Settings {
    /// In-memory settings that will be written to `path` on [`Self::flush`].
    pub fn new(path: impl Into<Utf8PathBuf>, max_files: usize) -> Self {
        Self {
            path: path.into(),
            values: BTreeMap::new(),
            max_files,
        }
    }

    /// Read `path` if it exists, otherwise start empty. Either way the
    /// result is initialized.
    pub fn load_or_default(path: impl Into<Utf8PathBuf>, max_files: usize) -> Result<Self> {
        let mut settings = Self::new(path, max_files);
        if settings.path.exists() {
            let text = std::fs::read_to_string(&settings.path)
                .with_context(|| format!("Failed to read settings {}", settings.path))?;
            settings.values = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse settings {}", settings.path))?;
            log::debug!("loaded {} setting(s) from {}", settings.values.len(), settings.path);
        }
        settings.initialize(None);
        Ok(settings)
    }

    /// Write every value to disk, creating parent directories as needed.
    pub fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Create settings directory {}", parent))?;
        }
        let json = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write settings {}", self.path))?;
        Ok(())
    }

    /// Remove the settings file from disk. In-memory values are kept.
    pub fn delete_file(&self) -> Result<()> {
        log::info!("deleting settings: \"{}\"", self.path);
        std::fs::remove_file(&self.path)
            .with_context(|| format!("Failed to delete settings {}", self.path))
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    pub fn set_max_files(&mut self, max_files: usize) {
        self.max_files = max_files;
    }

    /// Fill in whatever a fresh settings file lacks: default window layout
    /// (when a host is given), the recent files array and the default
    /// preferences.
    pub fn initialize(&mut self, host: Option<&dyn WindowHost>) {
        let groups = self.child_groups();
        if !groups.iter().any(|g| g == MAIN_WINDOW) {
            if let Some(host) = host {
                self.set_value(
                    layout_key(MAIN_WINDOW, "geometry", DEFAULT_LAYOUT),
                    host.save_geometry(),
                );
                self.set_value(
                    layout_key(MAIN_WINDOW, "windowState", DEFAULT_LAYOUT),
                    host.save_state(),
                );
            }
        }
        if !groups.iter().any(|g| g == RECENT_FILES) {
            self.write_array(RECENT_FILES, &[]);
        }
        if !groups.iter().any(|g| g == PREFERENCES) {
            for (key, value) in EditorConfig::default().preference_defaults() {
                self.set_value(format!("{}/default/{}", PREFERENCES, key), value);
            }
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Keys and groups
    // ────────────────────────────────────────────────────────────────────────

    /// Top-level groups, sorted.
    pub fn child_groups(&self) -> Vec<String> {
        let groups: BTreeSet<&str> = self
            .values
            .keys()
            .filter_map(|k| k.split_once('/').map(|(group, _)| group))
            .collect();
        groups.into_iter().map(str::to_string).collect()
    }

    pub fn all_keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn value(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<SettingValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Remove a key, or a whole group when `key` names one. Returns the
    /// number of removed entries.
    pub fn remove(&mut self, key: &str) -> usize {
        let prefix = format!("{}/", key);
        let before = self.values.len();
        self.values.retain(|k, _| k != key && !k.starts_with(&prefix));
        before - self.values.len()
    }

    /// Records of the array `name`, in index order.
    pub fn read_array(&self, name: &str) -> Vec<SettingRecord> {
        let size = self
            .value(&format!("{}/size", name))
            .and_then(SettingValue::as_i64)
            .unwrap_or(0)
            .max(0) as usize;
        (1..=size)
            .map(|i| {
                let prefix = format!("{}/{}/", name, i);
                self.values
                    .range(prefix.clone()..)
                    .take_while(|(k, _)| k.starts_with(&prefix))
                    .map(|(k, v)| (k[prefix.len()..].to_string(), v.clone()))
                    .collect()
            })
            .collect()
    }

    /// Replace the array `name` with `records`.
    pub fn write_array(&mut self, name: &str, records: &[SettingRecord]) {
        self.remove(name);
        self.set_value(format!("{}/size", name), records.len() as i64);
        for (i, record) in records.iter().enumerate() {
            for (field, value) in record {
                self.set_value(format!("{}/{}/{}", name, i + 1, field), value.clone());
            }
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Preferences
    // ────────────────────────────────────────────────────────────────────────

    /// Value of `<groups..>/default/<key>`.
    pub fn default_value(&self, key: &str, groups: &[&str]) -> Option<&SettingValue> {
        let mut path = groups.join("/");
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str("default/");
        path.push_str(key);
        self.value(&path)
    }

    /// User preference, falling back to its default.
    pub fn preference(&self, key: &str) -> Option<&SettingValue> {
        self.value(&format!("{}/{}", PREFERENCES, key))
            .or_else(|| self.default_value(key, &[PREFERENCES]))
    }

    pub fn set_preference(&mut self, key: &str, value: impl Into<SettingValue>) {
        self.set_value(format!("{}/{}", PREFERENCES, key), value);
    }

    // ────────────────────────────────────────────────────────────────────────
    // Layouts
    // ────────────────────────────────────────────────────────────────────────

    /// Store the host's window geometry, state and dock geometries as `name`.
    pub fn save_layout(&mut self, name: &str, host: &dyn WindowHost) {
        log::info!("saving layout: \"{}\"", name);
        self.set_value(layout_key(MAIN_WINDOW, "geometry", name), host.save_geometry());
        self.set_value(layout_key(MAIN_WINDOW, "windowState", name), host.save_state());
        for dock in host.dock_names() {
            if let Some(geometry) = host.save_dock_geometry(&dock) {
                self.set_value(layout_key(&dock, "geometry", name), geometry);
            }
        }
    }

    /// Apply the stored layout `name` to the host. Missing keys are skipped;
    /// returns whether anything was restored.
    pub fn restore_layout(&self, name: &str, host: &mut dyn WindowHost) -> bool {
        log::info!("restoring layout: \"{}\"", name);
        let mut restored = false;
        if let Some(data) = self.bytes(&layout_key(MAIN_WINDOW, "geometry", name)) {
            restored |= host.restore_geometry(data);
        }
        if let Some(data) = self.bytes(&layout_key(MAIN_WINDOW, "windowState", name)) {
            restored |= host.restore_state(data);
        }
        for dock in host.dock_names() {
            if let Some(data) = self.bytes(&layout_key(&dock, "geometry", name)) {
                restored |= host.restore_dock_geometry(&dock, data);
            }
        }
        if !restored {
            log::debug!("layout \"{}\" not found", name);
        }
        restored
    }

    /// Remove every key of layout `name`. Returns whether it existed.
    pub fn delete_layout(&mut self, name: &str) -> bool {
        log::info!("deleting layout: \"{}\"", name);
        let geometry = format!("/geometry/{}", name);
        let state = layout_key(MAIN_WINDOW, "windowState", name);
        let before = self.values.len();
        self.values
            .retain(|k, _| !k.ends_with(&geometry) && *k != state);
        self.values.len() != before
    }

    /// Names of all stored layouts, sorted and unique.
    pub fn layout_names(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self
            .values
            .keys()
            .filter_map(|k| k.rsplit_once("/geometry/").map(|(_, name)| name))
            .filter(|name| !name.is_empty())
            .collect();
        names.into_iter().map(str::to_string).collect()
    }

    fn bytes(&self, key: &str) -> Option<&[u8]> {
        self.value(key).and_then(SettingValue::as_bytes)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Recent files
    // ────────────────────────────────────────────────────────────────────────

    /// Recent files, most recent last.
    pub fn recent_files(&self) -> Vec<Utf8PathBuf> {
        let files: Vec<Utf8PathBuf> = self
            .read_array(RECENT_FILES)
            .into_iter()
            .filter_map(|r| r.get("file").and_then(SettingValue::as_str).map(Utf8PathBuf::from))
            .collect();
        let skip = files.len().saturating_sub(self.max_files);
        files.into_iter().skip(skip).collect()
    }

    /// Recent files for a menu: most recent first, at most `max_files`.
    pub fn recent_files_menu(&self) -> Vec<Utf8PathBuf> {
        let mut files = self.recent_files();
        files.reverse();
        files
    }

    /// Move `path` to the end of the recent files, dropping the oldest
    /// entries beyond `max_files`.
    pub fn add_recent_file(&mut self, path: impl AsRef<Utf8Path>) {
        let path = path.as_ref();
        let mut files = self.recent_files();
        files.retain(|f| f != path);
        files.push(path.to_path_buf());
        let skip = files.len().saturating_sub(self.max_files);
        let records: Vec<SettingRecord> = files
            .iter()
            .skip(skip)
            .map(|f| SettingRecord::from([("file".to_string(), SettingValue::from(f.as_str()))]))
            .collect();
        self.write_array(RECENT_FILES, &records);
    }

    pub fn clear_recent_files(&mut self) {
        self.remove(RECENT_FILES);
    }
}

fn layout_key(widget: &str, kind: &str, layout: &str) -> String {
    format!("{}/{}/{}", widget, kind, layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeWindow {
        geometry: Vec<u8>,
        state: Vec<u8>,
        docks: BTreeMap<String, Vec<u8>>,
    }

    impl WindowHost for FakeWindow {
        fn save_geometry(&self) -> Vec<u8> {
            self.geometry.clone()
        }
        fn save_state(&self) -> Vec<u8> {
            self.state.clone()
        }
        fn restore_geometry(&mut self, data: &[u8]) -> bool {
            self.geometry = data.to_vec();
            true
        }
        fn restore_state(&mut self, data: &[u8]) -> bool {
            self.state = data.to_vec();
            true
        }
        fn dock_names(&self) -> Vec<String> {
            self.docks.keys().cloned().collect()
        }
        fn save_dock_geometry(&self, dock: &str) -> Option<Vec<u8>> {
            self.docks.get(dock).cloned()
        }
        fn restore_dock_geometry(&mut self, dock: &str, data: &[u8]) -> bool {
            self.docks.insert(dock.to_string(), data.to_vec());
            true
        }
    }

    fn settings() -> Settings {
        let mut s = Settings::new("unused.json", 3);
        s.initialize(None);
        s
    }

    #[test]
    fn test_initialize_writes_defaults() {
        let s = settings();
        assert_eq!(s.child_groups(), vec![PREFERENCES.to_string(), RECENT_FILES.to_string()]);
        assert_eq!(
            s.default_value("history_limit", &[PREFERENCES]),
            Some(&SettingValue::Int(i64::MAX))
        );
        assert!(s.recent_files().is_empty());
    }

    #[test]
    fn test_initialize_with_host_stores_default_layout() {
        let window = FakeWindow {
            geometry: vec![1, 2],
            state: vec![3],
            ..Default::default()
        };
        let mut s = Settings::new("unused.json", 3);
        s.initialize(Some(&window));
        assert_eq!(s.layout_names(), vec![DEFAULT_LAYOUT.to_string()]);
    }

    #[test]
    fn test_remove_group() {
        let mut s = settings();
        s.set_value("A/b/c", 1i64);
        s.set_value("A/d", 2i64);
        s.set_value("AB/e", 3i64);
        assert_eq!(s.remove("A"), 2);
        assert!(s.contains("AB/e"));
    }

    #[test]
    fn test_array_round_trip() {
        let mut s = settings();
        let records = vec![
            SettingRecord::from([("file".to_string(), SettingValue::from("a.json"))]),
            SettingRecord::from([("file".to_string(), SettingValue::from("b.json"))]),
        ];
        s.write_array("Things", &records);
        assert_eq!(s.read_array("Things"), records);
        s.write_array("Things", &records[..1]);
        assert_eq!(s.read_array("Things").len(), 1);
        assert!(!s.contains("Things/2/file"));
    }

    #[test]
    fn test_recent_files_dedupe_and_cap() {
        let mut s = settings();
        for f in ["a", "b", "c", "a", "d"] {
            s.add_recent_file(f);
        }
        let files: Vec<String> = s.recent_files().iter().map(|p| p.to_string()).collect();
        assert_eq!(files, vec!["c", "a", "d"]);
        let menu: Vec<String> = s.recent_files_menu().iter().map(|p| p.to_string()).collect();
        assert_eq!(menu, vec!["d", "a", "c"]);
        s.clear_recent_files();
        assert!(s.recent_files().is_empty());
    }

    #[test]
    fn test_layout_save_restore_delete() {
        let mut window = FakeWindow {
            geometry: vec![1],
            state: vec![2],
            docks: BTreeMap::from([("Attributes".to_string(), vec![9])]),
        };
        let mut s = settings();
        s.save_layout("work", &window);
        assert_eq!(s.layout_names(), vec!["work".to_string()]);

        window.geometry = vec![7];
        window.docks.insert("Attributes".to_string(), vec![0]);
        assert!(s.restore_layout("work", &mut window));
        assert_eq!(window.geometry, vec![1]);
        assert_eq!(window.docks["Attributes"], vec![9]);

        assert!(s.delete_layout("work"));
        assert!(s.layout_names().is_empty());
        assert!(!s.restore_layout("work", &mut window));
    }

    #[test]
    fn test_preference_falls_back_to_default() {
        let mut s = settings();
        assert_eq!(s.preference("max_recent_files"), Some(&SettingValue::Int(10)));
        s.set_preference("max_recent_files", 4i64);
        assert_eq!(s.preference("max_recent_files"), Some(&SettingValue::Int(4)));
    }
}
