pub mod profiles;
pub mod settings_store;

pub use settings_store::{SettingsData, SettingsStore, SETTINGS_FILE};
