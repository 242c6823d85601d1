use nxui_core::{
    GlobalSettings, Position, ProfileSnapshot, StateRecord, StateStore, WidgetError, WidgetResult,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "nxui-settings.json";

/// Everything NxUI persists, as laid out on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsData {
    #[serde(default)]
    pub widgets: BTreeMap<String, StateRecord>,
    #[serde(default)]
    pub widget_settings: BTreeMap<String, Map<String, Value>>,
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileSnapshot>,
    #[serde(default)]
    pub global_settings: GlobalSettings,
}

/// JSON-file backed settings collaborator.
///
/// The in-memory copy is authoritative. Every mutation is written through
/// with a temp-file rename while the lock is held, so concurrent writers
/// cannot reorder saves.
pub struct SettingsStore {
    path: PathBuf,
    data: Mutex<SettingsData>,
}

impl SettingsStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let data = Self::read(&path);
        Self {
            path,
            data: Mutex::new(data),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> SettingsData {
        self.data.lock().clone()
    }

    fn read(path: &Path) -> SettingsData {
        if !path.exists() {
            return SettingsData::default();
        }
        let parsed = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_json::from_str(&content).map_err(|e| e.to_string()));
        match parsed {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(
                    "Failed to load settings from {}, using defaults: {}",
                    path.display(),
                    e
                );
                SettingsData::default()
            }
        }
    }

    fn write(&self, data: &SettingsData) -> WidgetResult<()> {
        let persistence = |e: &dyn std::fmt::Display| {
            WidgetError::Persistence(format!("{}: {}", self.path.display(), e))
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| persistence(&e))?;
        }
        let content = serde_json::to_string_pretty(data).map_err(|e| persistence(&e))?;

        let temp_path = self.path.with_extension("tmp");
        {
            let mut file = File::create(&temp_path).map_err(|e| persistence(&e))?;
            file.write_all(content.as_bytes()).map_err(|e| persistence(&e))?;
            file.sync_all().map_err(|e| persistence(&e))?;
        }
        fs::rename(&temp_path, &self.path).map_err(|e| persistence(&e))?;
        Ok(())
    }

    /// Apply `change` and save if it reports a modification.
    pub(crate) fn mutate<F>(&self, change: F) -> WidgetResult<()>
    where
        F: FnOnce(&mut SettingsData) -> bool,
    {
        let mut data = self.data.lock();
        if !change(&mut data) {
            return Ok(());
        }
        self.write(&data)
    }

    pub(crate) fn read_with<T>(&self, view: impl FnOnce(&SettingsData) -> T) -> T {
        view(&self.data.lock())
    }

    fn update_record<F>(&self, id: &str, change: F) -> WidgetResult<()>
    where
        F: FnOnce(&mut StateRecord),
    {
        self.mutate(|data| match data.widgets.get_mut(id) {
            Some(record) => {
                change(record);
                true
            }
            None => false,
        })
    }
}

impl StateStore for SettingsStore {
    fn get(&self, id: &str) -> Option<StateRecord> {
        self.read_with(|data| data.widgets.get(id).cloned())
    }

    fn set(&self, id: &str, record: StateRecord) -> WidgetResult<()> {
        self.mutate(|data| {
            data.widgets.insert(id.to_string(), record);
            true
        })
    }

    fn remove(&self, id: &str) -> WidgetResult<()> {
        self.mutate(|data| data.widgets.remove(id).is_some())
    }

    fn get_all(&self) -> BTreeMap<String, StateRecord> {
        self.read_with(|data| data.widgets.clone())
    }

    fn set_position(&self, id: &str, position: Position) -> WidgetResult<()> {
        self.update_record(id, |record| record.position = position)
    }

    fn set_size(&self, id: &str, width: u32, height: u32) -> WidgetResult<()> {
        self.update_record(id, |record| {
            record.width = Some(width);
            record.height = Some(height);
        })
    }

    fn set_enabled(&self, id: &str, enabled: bool) -> WidgetResult<()> {
        self.update_record(id, |record| record.enabled = enabled)
    }

    fn set_draggable(&self, id: &str, draggable: bool) -> WidgetResult<()> {
        self.update_record(id, |record| record.draggable = Some(draggable))
    }

    fn set_opacity(&self, id: &str, opacity: f64) -> WidgetResult<()> {
        self.update_record(id, |record| record.opacity = Some(opacity))
    }

    fn set_hidden(&self, id: &str, hidden: bool) -> WidgetResult<()> {
        self.update_record(id, |record| record.hidden = hidden.then_some(true))
    }

    fn widget_settings(&self, id: &str) -> Map<String, Value> {
        self.read_with(|data| data.widget_settings.get(id).cloned().unwrap_or_default())
    }

    fn set_widget_setting(&self, id: &str, key: &str, value: Value) -> WidgetResult<()> {
        self.mutate(|data| {
            data.widget_settings
                .entry(id.to_string())
                .or_default()
                .insert(key.to_string(), value);
            true
        })
    }

    fn remove_widget_settings(&self, id: &str) -> WidgetResult<()> {
        self.mutate(|data| data.widget_settings.remove(id).is_some())
    }

    fn global_settings(&self) -> GlobalSettings {
        self.read_with(|data| data.global_settings.clone())
    }

    fn set_global_settings(&self, settings: GlobalSettings) -> WidgetResult<()> {
        self.mutate(|data| {
            data.global_settings = settings;
            true
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use nxui_core::WidgetRuntimeState;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(x: i32, y: i32) -> StateRecord {
        WidgetRuntimeState::with_defaults(Position::new(x, y)).to_record()
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let store = SettingsStore::open(temp.path().join(SETTINGS_FILE));
        assert!(store.get_all().is_empty());
        assert_eq!(store.global_settings().active_theme, "miku-garden");
    }

    #[test]
    fn test_changes_survive_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(SETTINGS_FILE);
        {
            let store = SettingsStore::open(&path);
            store.set("clock", record(10, 20)).unwrap();
            store.set_position("clock", Position::new(30, 40)).unwrap();
            store.set_opacity("clock", 0.5).unwrap();
            store.set_hidden("clock", true).unwrap();
            store.set_widget_setting("clock", "format", json!("24h")).unwrap();
        }

        let reopened = SettingsStore::open(&path);
        let clock = reopened.get("clock").unwrap();
        assert_eq!(clock.position, Position::new(30, 40));
        assert_eq!(clock.opacity, Some(0.5));
        assert_eq!(clock.hidden, Some(true));
        assert_eq!(reopened.widget_settings("clock")["format"], json!("24h"));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_field_setters_ignore_unknown_widgets() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(SETTINGS_FILE);
        let store = SettingsStore::open(&path);

        store.set_enabled("ghost", false).unwrap();
        store.set_position("ghost", Position::new(1, 1)).unwrap();
        assert!(store.get("ghost").is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(SETTINGS_FILE);
        fs::write(&path, "{ not json").unwrap();

        let store = SettingsStore::open(&path);
        assert!(store.get_all().is_empty());
        store.set("clock", record(1, 2)).unwrap();
        assert!(SettingsStore::open(&path).get("clock").is_some());
    }

    #[test]
    fn test_remove_drops_record_and_settings() {
        let temp = TempDir::new().unwrap();
        let store = SettingsStore::open(temp.path().join(SETTINGS_FILE));
        store.set("notes", record(0, 0)).unwrap();
        store.set_widget_setting("notes", "text", json!("hi")).unwrap();

        store.remove("notes").unwrap();
        store.remove_widget_settings("notes").unwrap();
        assert!(store.get("notes").is_none());
        assert!(store.widget_settings("notes").is_empty());
    }

    #[test]
    fn test_write_failure_is_persistence_error() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();

        let store = SettingsStore::open(blocker.join(SETTINGS_FILE));
        let err = store.set("clock", record(0, 0)).unwrap_err();
        assert!(matches!(err, WidgetError::Persistence(_)));
        // In-memory state stays authoritative.
        assert!(store.get("clock").is_some());
    }
}
