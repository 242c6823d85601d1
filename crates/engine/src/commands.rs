//! Control-plane command surface.
//!
//! Every command is answered with a [`CommandResponse`]; failures never
//! escape as errors.

use crate::manager::WidgetManager;
use nxui_core::{WidgetError, WidgetResult};
use nxui_ecosystem::WidgetInstaller;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum Command {
    List,
    Toggle { id: String, enabled: bool },
    ToggleDrag { id: String },
    SetOpacity { id: String, opacity: f64 },
    Reload { id: String },
    GetSetting { id: String, key: String },
    SetSetting { id: String, key: String, value: Value },
    GetProfile { name: String },
    ListProfiles,
    ApplyProfile { name: String },
    SaveProfile { name: String },
    DeleteProfile { name: String },
    HideAll,
    ShowAll,
    ToggleAll,
    ListThemes,
    SetTheme { id: String },
    Registry,
    Install { id: String },
    Uninstall { id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: &WidgetError) -> Self {
        Self {
            success: false,
            data: Some(json!({ "kind": error.kind() })),
            error: Some(error.to_string()),
        }
    }
}

impl From<WidgetResult<Value>> for CommandResponse {
    fn from(result: WidgetResult<Value>) -> Self {
        match result {
            Ok(data) => CommandResponse::ok(data),
            Err(e) => CommandResponse::failure(&e),
        }
    }
}

fn to_value<T: Serialize>(value: T) -> WidgetResult<Value> {
    serde_json::to_value(value).map_err(|e| WidgetError::Persistence(e.to_string()))
}

pub struct CommandRouter {
    manager: Arc<WidgetManager>,
    installer: Option<Arc<WidgetInstaller>>,
}

impl CommandRouter {
    pub fn new(manager: Arc<WidgetManager>) -> Self {
        Self {
            manager,
            installer: None,
        }
    }

    pub fn with_installer(mut self, installer: Arc<WidgetInstaller>) -> Self {
        self.installer = Some(installer);
        self
    }

    pub fn manager(&self) -> &Arc<WidgetManager> {
        &self.manager
    }

    /// Parse and run one JSON command.
    pub async fn execute_json(&self, line: &str) -> CommandResponse {
        match serde_json::from_str::<Command>(line) {
            Ok(command) => self.execute(command).await,
            Err(e) => CommandResponse {
                success: false,
                data: Some(json!({ "kind": "invalid_command" })),
                error: Some(format!("Invalid command: {e}")),
            },
        }
    }

    pub async fn execute(&self, command: Command) -> CommandResponse {
        tracing::debug!("Command: {:?}", command);
        let response: CommandResponse = self.dispatch(command).await.into();
        if let Some(error) = &response.error {
            tracing::warn!("Command failed: {}", error);
        }
        response
    }

    async fn dispatch(&self, command: Command) -> WidgetResult<Value> {
        let manager = &self.manager;
        match command {
            Command::List => to_value(manager.list_widgets()),
            Command::Toggle { id, enabled } => {
                let changed = manager.toggle_widget(&id, enabled).await?;
                Ok(json!({ "id": id, "enabled": enabled, "changed": changed }))
            }
            Command::ToggleDrag { id } => match manager.toggle_drag(&id).await {
                Some(draggable) => Ok(json!({ "id": id, "draggable": draggable, "changed": true })),
                None => Ok(json!({ "id": id, "changed": false })),
            },
            Command::SetOpacity { id, opacity } => {
                let applied = manager.set_opacity(&id, opacity).await;
                Ok(json!({ "id": id, "opacity": applied }))
            }
            Command::Reload { id } => {
                manager.reload_widget(&id).await?;
                Ok(json!({ "id": id, "reloaded": true }))
            }
            Command::GetSetting { id, key } => {
                let value = manager.get_setting(&id, &key)?;
                Ok(json!({ "id": id, "key": key, "value": value }))
            }
            Command::SetSetting { id, key, value } => {
                manager.set_setting(&id, &key, value.clone()).await?;
                Ok(json!({ "id": id, "key": key, "value": value }))
            }
            Command::GetProfile { name } => to_value(manager.get_profile(&name)?),
            Command::ListProfiles => to_value(manager.list_profiles()),
            Command::ApplyProfile { name } => {
                let applied = manager.apply_profile(&name).await?;
                Ok(json!({ "profile": name, "applied": applied }))
            }
            Command::SaveProfile { name } => {
                let snapshot = manager.save_profile(&name)?;
                Ok(json!({ "profile": name, "widgets": snapshot.len() }))
            }
            Command::DeleteProfile { name } => {
                manager.delete_profile(&name)?;
                Ok(json!({ "profile": name, "deleted": true }))
            }
            Command::HideAll => Ok(json!({ "action": "hide", "count": manager.hide_all().await })),
            Command::ShowAll => Ok(json!({ "action": "show", "count": manager.show_all().await })),
            Command::ToggleAll => Ok(manager.toggle_all().await.to_json()),
            Command::ListThemes => to_value(manager.list_themes()),
            Command::SetTheme { id } => {
                manager.set_theme(&id)?;
                Ok(json!({ "theme": id }))
            }
            Command::Registry => {
                let installer = self.installer()?;
                to_value(installer.registry().fetch().await)
            }
            Command::Install { id } => self.install(&id).await,
            Command::Uninstall { id } => self.uninstall(&id).await,
        }
    }

    fn installer(&self) -> WidgetResult<&Arc<WidgetInstaller>> {
        self.installer
            .as_ref()
            .ok_or_else(|| WidgetError::Install("widget store is not configured".to_string()))
    }

    async fn install(&self, id: &str) -> WidgetResult<Value> {
        let installer = self.installer()?;
        let entry = installer
            .registry()
            .find(id)
            .await
            .ok_or_else(|| WidgetError::Install(format!("'{id}' is not in the registry")))?;
        let source = installer.install(&entry).await?;
        let path = source.entry_path.clone();

        match self.manager.load_source(source).await {
            Ok(()) => Ok(json!({ "id": id, "installed": true, "loaded": true, "path": path })),
            Err(e) => {
                tracing::error!("Installed '{}' but it failed to load: {}", id, e);
                Ok(json!({
                    "id": id,
                    "installed": true,
                    "loaded": false,
                    "path": path,
                    "loadError": e.to_string(),
                }))
            }
        }
    }

    async fn uninstall(&self, id: &str) -> WidgetResult<Value> {
        let installer = self.installer()?;
        nxui_ecosystem::validate_widget_id(id)?;
        let forgotten = self.manager.uninstall_widget(id).await;
        let removed = installer.remove_files(id).await?;
        if !forgotten && !removed {
            return Err(WidgetError::UnknownWidget(id.to_string()));
        }
        Ok(json!({ "id": id, "uninstalled": true }))
    }
}
