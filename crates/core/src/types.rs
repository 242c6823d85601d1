use crate::convention::WidgetSource;
use crate::error::{WidgetError, WidgetResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

pub const MIN_OPACITY: f64 = 0.1;
pub const MAX_OPACITY: f64 = 1.0;
pub const DEFAULT_THEME: &str = "miku-garden";

/// Clamp a requested opacity into the supported range. NaN falls back to fully opaque.
pub fn clamp_opacity(requested: f64) -> f64 {
    if requested.is_nan() {
        return MAX_OPACITY;
    }
    requested.clamp(MIN_OPACITY, MAX_OPACITY)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesktopLevel {
    #[default]
    Top,
    Normal,
    Bottom,
}

impl DesktopLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DesktopLevel::Top => "top",
            DesktopLevel::Normal => "normal",
            DesktopLevel::Bottom => "bottom",
        }
    }
}

impl FromStr for DesktopLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(DesktopLevel::Top),
            "normal" => Ok(DesktopLevel::Normal),
            "bottom" => Ok(DesktopLevel::Bottom),
            other => Err(format!("expected top, normal or bottom, got \"{other}\"")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in desktop coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Extent as a signed coordinate offset, capped at `i32::MAX`.
fn span(extent: u32) -> i32 {
    i32::try_from(extent).unwrap_or(i32::MAX)
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(span(self.width))
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(span(self.height))
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    /// Grow the rectangle by `margin` on every side.
    pub fn inflate(&self, margin: u32) -> Rect {
        let m = span(margin);
        let grow = margin.saturating_mul(2);
        Rect {
            x: self.x.saturating_sub(m),
            y: self.y.saturating_sub(m),
            width: self.width.saturating_add(grow),
            height: self.height.saturating_add(grow),
        }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.left() < other.right()
            && other.left() < self.right()
            && self.top() < other.bottom()
            && other.top() < self.bottom()
    }
}

// ---------------------------------------------------------------------------
// Settings schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingKind {
    Text,
    Number,
    Toggle,
    Select,
    Color,
}

impl FromStr for SettingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(SettingKind::Text),
            "number" => Ok(SettingKind::Number),
            "toggle" => Ok(SettingKind::Toggle),
            "select" => Ok(SettingKind::Select),
            "color" => Ok(SettingKind::Color),
            other => Err(format!("unknown setting type \"{other}\"")),
        }
    }
}

/// A user-configurable knob declared by a widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingDefinition {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: SettingKind,
    pub default: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl SettingDefinition {
    pub fn validate(&self, value: &Value) -> WidgetResult<()> {
        let invalid = |reason: String| {
            Err(WidgetError::InvalidSetting(format!("{}: {}", self.key, reason)))
        };

        match self.kind {
            SettingKind::Text | SettingKind::Color => {
                if !value.is_string() {
                    return invalid(format!("expected a string, got {value}"));
                }
            }
            SettingKind::Toggle => {
                if !value.is_boolean() {
                    return invalid(format!("expected true or false, got {value}"));
                }
            }
            SettingKind::Number => {
                let Some(number) = value.as_f64() else {
                    return invalid(format!("expected a number, got {value}"));
                };
                if let Some(min) = self.min {
                    if number < min {
                        return invalid(format!("{number} is below the minimum {min}"));
                    }
                }
                if let Some(max) = self.max {
                    if number > max {
                        return invalid(format!("{number} is above the maximum {max}"));
                    }
                }
            }
            SettingKind::Select => {
                let Some(choice) = value.as_str() else {
                    return invalid(format!("expected one of {:?}", self.options));
                };
                if !self.options.iter().any(|option| option == choice) {
                    return invalid(format!("\"{choice}\" is not one of {:?}", self.options));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Pure-data half of a widget descriptor. Deterministic for the same source bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetManifest {
    pub name: String,
    pub version: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub width: u32,
    pub height: u32,
    pub transparent: bool,
    pub always_on_top: bool,
    pub desktop_level: DesktopLevel,
    pub resizable: bool,
    pub click_through: bool,
    #[serde(default)]
    pub settings: Vec<SettingDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles: Option<String>,
}

impl WidgetManifest {
    pub fn setting(&self, key: &str) -> Option<&SettingDefinition> {
        self.settings.iter().find(|def| def.key == key)
    }
}

/// Produces the markup shown inside a surface.
pub trait RenderFn: Send + Sync {
    fn render(&self) -> WidgetResult<String>;
}

/// Mount, destroy or resize callback supplied by a widget.
pub trait LifecycleHook: Send + Sync {
    fn invoke(&self, args: Vec<Value>) -> WidgetResult<()>;
}

/// Render function backed by a literal template file.
pub struct StaticMarkup(pub String);

impl RenderFn for StaticMarkup {
    fn render(&self) -> WidgetResult<String> {
        Ok(self.0.clone())
    }
}

#[derive(Clone, Default)]
pub struct WidgetHooks {
    pub render: Option<Arc<dyn RenderFn>>,
    pub on_mount: Option<Arc<dyn LifecycleHook>>,
    pub on_destroy: Option<Arc<dyn LifecycleHook>>,
    pub on_resize: Option<Arc<dyn LifecycleHook>>,
}

impl fmt::Debug for WidgetHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetHooks")
            .field("render", &self.render.is_some())
            .field("on_mount", &self.on_mount.is_some())
            .field("on_destroy", &self.on_destroy.is_some())
            .field("on_resize", &self.on_resize.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct WidgetDescriptor {
    pub manifest: WidgetManifest,
    pub hooks: WidgetHooks,
}

impl WidgetDescriptor {
    pub fn new(manifest: WidgetManifest) -> Self {
        Self {
            manifest,
            hooks: WidgetHooks::default(),
        }
    }

    /// Run the render function. Widgets without one render nothing.
    pub fn render_markup(&self) -> WidgetResult<String> {
        match &self.hooks.render {
            Some(render) => render.render(),
            None => Ok(String::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Runtime state
// ---------------------------------------------------------------------------

/// Persisted per-widget record. Older records may lack `draggable` and `opacity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRecord {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draggable: Option<bool>,
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
}

impl StateRecord {
    pub fn needs_backfill(&self) -> bool {
        self.draggable.is_none() || self.opacity.is_none()
    }

    pub fn resolve(&self) -> WidgetRuntimeState {
        WidgetRuntimeState {
            enabled: self.enabled,
            draggable: self.draggable.unwrap_or(true),
            position: self.position,
            width: self.width,
            height: self.height,
            opacity: clamp_opacity(self.opacity.unwrap_or(MAX_OPACITY)),
            hidden: self.hidden.unwrap_or(false),
        }
    }
}

/// Resolved runtime state of a widget, with every field present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetRuntimeState {
    pub enabled: bool,
    pub draggable: bool,
    pub position: Position,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub opacity: f64,
    pub hidden: bool,
}

impl WidgetRuntimeState {
    pub fn with_defaults(position: Position) -> Self {
        Self {
            enabled: true,
            draggable: true,
            position,
            width: None,
            height: None,
            opacity: MAX_OPACITY,
            hidden: false,
        }
    }

    pub fn to_record(&self) -> StateRecord {
        StateRecord {
            enabled: self.enabled,
            draggable: Some(self.draggable),
            position: self.position,
            width: self.width,
            height: self.height,
            opacity: Some(self.opacity),
            hidden: self.hidden.then_some(true),
        }
    }

    /// Size override if present, otherwise the widget's intrinsic size.
    pub fn bounds(&self, manifest: &WidgetManifest) -> Rect {
        Rect::new(
            self.position.x,
            self.position.y,
            self.width.unwrap_or(manifest.width),
            self.height.unwrap_or(manifest.height),
        )
    }
}

/// Named copy of the whole runtime-state table.
pub type ProfileSnapshot = BTreeMap<String, StateRecord>;

/// In-memory aggregate for one loaded widget.
#[derive(Debug, Clone)]
pub struct WidgetInstance {
    pub id: String,
    pub source: WidgetSource,
    pub descriptor: Arc<WidgetDescriptor>,
    pub state: WidgetRuntimeState,
}

impl WidgetInstance {
    pub fn summary(&self) -> WidgetSummary {
        let manifest = &self.descriptor.manifest;
        WidgetSummary {
            id: self.id.clone(),
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            author: manifest.author.clone(),
            description: manifest.description.clone(),
            enabled: self.state.enabled,
            draggable: self.state.draggable,
            opacity: self.state.opacity,
            hidden: self.state.hidden,
            source_path: self.source.entry_path.clone(),
            settings: manifest.settings.clone(),
        }
    }
}

/// Row returned by the `list` control-plane command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSummary {
    pub id: String,
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub draggable: bool,
    pub opacity: f64,
    pub hidden: bool,
    pub source_path: PathBuf,
    pub settings: Vec<SettingDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widgets_directory: Option<PathBuf>,
    #[serde(default = "default_theme")]
    pub active_theme: String,
}

fn default_theme() -> String {
    DEFAULT_THEME.to_string()
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            widgets_directory: None,
            active_theme: default_theme(),
        }
    }
}
