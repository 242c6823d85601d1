use crate::settings_store::SettingsStore;
use nxui_core::{ProfileSnapshot, ProfileStore, WidgetError, WidgetResult};
use std::collections::BTreeMap;

fn validate_profile_name(name: &str) -> WidgetResult<()> {
    if name.trim().is_empty() {
        return Err(WidgetError::InvalidSetting(
            "profile name cannot be empty".to_string(),
        ));
    }
    Ok(())
}

impl ProfileStore for SettingsStore {
    fn save_profile(&self, name: &str) -> WidgetResult<ProfileSnapshot> {
        validate_profile_name(name)?;
        let mut saved = ProfileSnapshot::new();
        self.mutate(|data| {
            saved = data.widgets.clone();
            data.profiles.insert(name.to_string(), saved.clone());
            true
        })?;
        tracing::info!("Saved profile '{}' with {} widgets", name, saved.len());
        Ok(saved)
    }

    fn load_profile(&self, name: &str) -> Option<ProfileSnapshot> {
        self.read_with(|data| data.profiles.get(name).cloned())
    }

    fn delete_profile(&self, name: &str) -> WidgetResult<()> {
        self.mutate(|data| data.profiles.remove(name).is_some())
    }

    fn list_profiles(&self) -> BTreeMap<String, ProfileSnapshot> {
        self.read_with(|data| data.profiles.clone())
    }
}
