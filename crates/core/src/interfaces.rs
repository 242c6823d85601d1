//! Ports between the widget runtime and its collaborators.
//!
//! Persistence, the display, the presentation layer and the script loader are
//! all reached through these traits so the orchestrator can be exercised with
//! in-memory doubles.

use crate::error::WidgetResult;
use crate::types::{
    DesktopLevel, GlobalSettings, Position, ProfileSnapshot, Rect, StateRecord, WidgetDescriptor,
};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Durable key-value store for per-widget runtime records.
///
/// Every mutating call performs a durable save. Named field setters are
/// no-ops for identifiers without a record.
pub trait StateStore: Send + Sync {
    fn get(&self, id: &str) -> Option<StateRecord>;
    fn set(&self, id: &str, record: StateRecord) -> WidgetResult<()>;
    fn remove(&self, id: &str) -> WidgetResult<()>;
    fn get_all(&self) -> BTreeMap<String, StateRecord>;

    fn set_position(&self, id: &str, position: Position) -> WidgetResult<()>;
    fn set_size(&self, id: &str, width: u32, height: u32) -> WidgetResult<()>;
    fn set_enabled(&self, id: &str, enabled: bool) -> WidgetResult<()>;
    fn set_draggable(&self, id: &str, draggable: bool) -> WidgetResult<()>;
    fn set_opacity(&self, id: &str, opacity: f64) -> WidgetResult<()>;
    fn set_hidden(&self, id: &str, hidden: bool) -> WidgetResult<()>;

    fn widget_settings(&self, id: &str) -> Map<String, Value>;
    fn set_widget_setting(&self, id: &str, key: &str, value: Value) -> WidgetResult<()>;
    fn remove_widget_settings(&self, id: &str) -> WidgetResult<()>;

    fn global_settings(&self) -> GlobalSettings;
    fn set_global_settings(&self, settings: GlobalSettings) -> WidgetResult<()>;
}

/// Named snapshots of the whole runtime-state table.
pub trait ProfileStore: Send + Sync {
    fn save_profile(&self, name: &str) -> WidgetResult<ProfileSnapshot>;
    fn load_profile(&self, name: &str) -> Option<ProfileSnapshot>;
    fn delete_profile(&self, name: &str) -> WidgetResult<()>;
    fn list_profiles(&self) -> BTreeMap<String, ProfileSnapshot>;
}

/// Geometry of the primary display.
pub trait DisplayInfo: Send + Sync {
    /// Usable area, excluding panels and docks.
    fn primary_work_area(&self) -> Rect;
}

/// Compiles and runs one widget source into a validated descriptor.
#[async_trait]
pub trait WidgetLoader: Send + Sync {
    async fn load(
        &self,
        entry_path: &Path,
        companion_dir: Option<&Path>,
    ) -> WidgetResult<WidgetDescriptor>;
}

// ---------------------------------------------------------------------------
// Presentation layer
// ---------------------------------------------------------------------------

/// Window options requested from the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceOptions {
    pub id: String,
    pub title: String,
    pub bounds: Rect,
    pub transparent: bool,
    pub frameless: bool,
    pub always_on_top: bool,
    pub level: DesktopLevel,
    pub resizable: bool,
    pub focusable: bool,
    pub opacity: f64,
    pub ignore_input: bool,
}

/// First message delivered to a new surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPayload {
    pub id: String,
    pub name: String,
    pub html: String,
    pub styles: String,
    pub click_through: bool,
    pub settings: Map<String, Value>,
    pub theme_css: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "signal", rename_all = "kebab-case")]
pub enum SurfaceSignal {
    Init(InitPayload),
    BeginHide,
    BeginShow,
    DragModeChanged { draggable: bool },
    SettingChanged { key: String, value: Value },
    ThemeChanged { css: String },
}

/// Feedback from a live surface, consumed by the widget manager.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceEvent {
    Moved(Position),
    Resized { width: u32, height: u32 },
    DragEnded,
    Closed,
}

/// A live on-screen object owned by the presentation layer.
pub trait NativeSurface: Send + Sync {
    fn send(&self, signal: SurfaceSignal);
    fn bounds(&self) -> Rect;
    fn set_bounds(&self, bounds: Rect);
    fn set_opacity(&self, opacity: f64);
    fn set_ignore_input(&self, ignore: bool);
    fn show(&self);
    /// Show without taking focus.
    fn show_inactive(&self);
    fn hide(&self);
    fn is_visible(&self) -> bool;
    fn close(&self);
    fn is_destroyed(&self) -> bool;
}

pub trait SurfaceBackend: Send + Sync {
    fn create_surface(&self, options: &SurfaceOptions) -> WidgetResult<Arc<dyn NativeSurface>>;
}
