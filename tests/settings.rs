use anyhow::Result;
use camino::Utf8PathBuf;
use scenegraph::settings::{SettingValue, Settings, WindowHost};
use scenegraph::EditorConfig;

#[derive(Default)]
struct Window {
    geometry: Vec<u8>,
    state: Vec<u8>,
    restores: usize,
}

impl WindowHost for Window {
    fn save_geometry(&self) -> Vec<u8> {
        self.geometry.clone()
    }
    fn save_state(&self) -> Vec<u8> {
        self.state.clone()
    }
    fn restore_geometry(&mut self, data: &[u8]) -> bool {
        self.geometry = data.to_vec();
        self.restores += 1;
        true
    }
    fn restore_state(&mut self, data: &[u8]) -> bool {
        self.state = data.to_vec();
        self.restores += 1;
        true
    }
    fn dock_names(&self) -> Vec<String> {
        Vec::new()
    }
    fn save_dock_geometry(&self, _dock: &str) -> Option<Vec<u8>> {
        None
    }
    fn restore_dock_geometry(&mut self, _dock: &str, _data: &[u8]) -> bool {
        false
    }
}

fn temp_settings_path(dir: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().join("prefs").join("scenegraph.json"))
        .expect("temp dir is UTF-8")
}

#[test]
fn restoring_a_never_saved_layout_is_a_no_op() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let settings = Settings::load_or_default(temp_settings_path(&dir), 10)?;
    let mut window = Window { geometry: vec![1, 2, 3], ..Default::default() };

    assert!(!settings.restore_layout("never-saved", &mut window));
    assert_eq!(window.restores, 0);
    assert_eq!(window.geometry, vec![1, 2, 3]);
    Ok(())
}

#[test]
fn recent_files_move_to_end_and_stay_capped() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut settings = Settings::load_or_default(temp_settings_path(&dir), 4)?;
    for name in ["a", "b", "c", "d", "e", "b", "f", "c"] {
        settings.add_recent_file(name);
        assert!(settings.recent_files().len() <= 4);
    }
    let files: Vec<String> = settings.recent_files().into_iter().map(String::from).collect();
    assert_eq!(files, vec!["e", "b", "f", "c"]);

    settings.add_recent_file("e");
    assert_eq!(settings.recent_files().last().map(|p| p.as_str()), Some("e"));
    assert_eq!(settings.recent_files().len(), 4);
    Ok(())
}

#[test]
fn flush_and_reload_round_trip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = temp_settings_path(&dir);
    let window = Window { geometry: vec![10, 20], state: vec![30], restores: 0 };

    let mut settings = Settings::load_or_default(path.clone(), 10)?;
    settings.initialize(Some(&window));
    settings.save_layout("review", &window);
    settings.add_recent_file("/tmp/graph.json");
    settings.set_preference("nodes_sort", "by-name");
    settings.flush()?;

    let reloaded = Settings::load_or_default(path.clone(), 10)?;
    assert_eq!(reloaded.layout_names(), vec!["default".to_string(), "review".to_string()]);
    assert_eq!(reloaded.recent_files(), vec![Utf8PathBuf::from("/tmp/graph.json")]);
    assert_eq!(
        reloaded.value("MainWindow/geometry/review"),
        Some(&SettingValue::Bytes(vec![10, 20]))
    );
    assert_eq!(
        EditorConfig::from_settings(&reloaded).nodes_sort,
        scenegraph::views::SortPolicy::ByName
    );

    let mut restored = Window::default();
    assert!(reloaded.restore_layout("review", &mut restored));
    assert_eq!(restored.geometry, vec![10, 20]);
    assert_eq!(restored.state, vec![30]);

    reloaded.delete_file()?;
    assert!(!path.exists());
    Ok(())
}

#[test]
fn corrupt_file_is_reported() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = Utf8PathBuf::from_path_buf(dir.path().join("broken.json"))
        .expect("temp dir is UTF-8");
    std::fs::write(&path, "{ not json")?;
    let err = Settings::load_or_default(path, 10).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse settings"));
    Ok(())
}

#[test]
fn deleting_a_layout_keeps_the_others() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let window = Window { geometry: vec![1], state: vec![2], restores: 0 };
    let mut settings = Settings::load_or_default(temp_settings_path(&dir), 10)?;
    settings.save_layout("one", &window);
    settings.save_layout("two", &window);
    assert!(settings.delete_layout("one"));
    assert!(!settings.delete_layout("one"));
    assert_eq!(settings.layout_names(), vec!["two".to_string()]);
    assert!(settings.contains("MainWindow/windowState/two"));
    assert!(!settings.contains("MainWindow/windowState/one"));
    Ok(())
}
