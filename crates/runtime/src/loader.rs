//! Sandboxed widget loader.
//!
//! Compiles a widget script, runs it with only the SDK factory importable,
//! extracts the exported descriptor, applies template/style companions and
//! validates the result.

use crate::sandbox::{apply_factory_defaults, SandboxLimits, ScriptCallback, ScriptSandbox};
use async_trait::async_trait;
use nxui_core::convention::{STYLES_FILE, TEMPLATE_FILE};
use nxui_core::{
    DesktopLevel, SettingDefinition, SettingKind, StaticMarkup, WidgetDescriptor, WidgetError,
    WidgetHooks, WidgetLoader, WidgetManifest, WidgetResult,
};
use rhai::{Array, Dynamic, FnPtr, Map, AST};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

const REQUIRED_FIELDS: [&str; 5] = ["name", "version", "author", "width", "height"];

/// Largest width or height a widget may declare; geometry is signed 32-bit.
pub const MAX_DIMENSION: u32 = i32::MAX as u32;

pub struct ScriptLoader {
    sandbox: Arc<ScriptSandbox>,
}

impl ScriptLoader {
    pub fn new(limits: SandboxLimits) -> Self {
        Self {
            sandbox: Arc::new(ScriptSandbox::new(limits)),
        }
    }

    pub fn with_sandbox(sandbox: Arc<ScriptSandbox>) -> Self {
        Self { sandbox }
    }

    /// Compile, run and extract synchronously. Companion files are not applied.
    pub fn evaluate(
        sandbox: &ScriptSandbox,
        path: &Path,
        source: &str,
    ) -> WidgetResult<WidgetDescriptor> {
        let ast = Arc::new(sandbox.compile(path, source)?);
        let exported = sandbox.execute(path, &ast)?;
        let map = export_map(path, exported)?;
        build_descriptor(sandbox, &ast, path, map)
    }
}

impl Default for ScriptLoader {
    fn default() -> Self {
        Self::new(SandboxLimits::default())
    }
}

#[async_trait]
impl WidgetLoader for ScriptLoader {
    async fn load(
        &self,
        entry_path: &Path,
        companion_dir: Option<&Path>,
    ) -> WidgetResult<WidgetDescriptor> {
        if !fs::try_exists(entry_path).await.unwrap_or(false) {
            return Err(WidgetError::NotFound(entry_path.to_path_buf()));
        }
        let source = fs::read_to_string(entry_path).await?;

        let sandbox = Arc::clone(&self.sandbox);
        let path = entry_path.to_path_buf();
        let mut descriptor = tokio::task::spawn_blocking(move || {
            ScriptLoader::evaluate(&sandbox, &path, &source)
        })
        .await
        .map_err(|err| WidgetError::Execution {
            path: entry_path.to_path_buf(),
            message: format!("loader task aborted: {err}"),
        })??;

        if let Some(dir) = companion_dir {
            apply_companions(&mut descriptor, dir).await?;
        }

        tracing::debug!(
            "Loaded widget {} v{} from {}",
            descriptor.manifest.name,
            descriptor.manifest.version,
            entry_path.display()
        );
        Ok(descriptor)
    }
}

async fn apply_companions(descriptor: &mut WidgetDescriptor, dir: &Path) -> WidgetResult<()> {
    let template = dir.join(TEMPLATE_FILE);
    if fs::try_exists(&template).await? {
        let markup = fs::read_to_string(&template).await?;
        descriptor.hooks.render = Some(Arc::new(StaticMarkup(markup)));
    }

    let styles = dir.join(STYLES_FILE);
    if fs::try_exists(&styles).await? {
        let css = fs::read_to_string(&styles).await?;
        let existing = descriptor.manifest.styles.take().unwrap_or_default();
        descriptor.manifest.styles = Some(format!("{existing}\n{css}"));
    }
    Ok(())
}

/// Default export if the script produced one, otherwise the whole export map.
fn export_map(path: &Path, exported: Dynamic) -> WidgetResult<Map> {
    let Some(mut map) = exported.try_cast::<Map>() else {
        return Err(WidgetError::invalid_field(
            path,
            "export",
            "widget script must evaluate to an object map",
        ));
    };
    if let Some(inner) = map.get("default").and_then(|value| value.clone().try_cast::<Map>()) {
        return Ok(inner);
    }
    map.remove("default");
    Ok(map)
}

struct Fields<'a> {
    path: &'a Path,
    map: Map,
}

impl Fields<'_> {
    fn present(&self, key: &str) -> Option<&Dynamic> {
        self.map.get(key).filter(|value| !value.is_unit())
    }

    fn check_required(&self) -> WidgetResult<()> {
        for field in REQUIRED_FIELDS {
            let missing = match self.present(field) {
                None => true,
                Some(value) if value.is_string() => {
                    value.clone().into_string().unwrap_or_default().is_empty()
                }
                Some(_) => false,
            };
            if missing {
                return Err(WidgetError::missing_field(self.path, field));
            }
        }
        Ok(())
    }

    fn string(&self, key: &str) -> WidgetResult<Option<String>> {
        match self.present(key) {
            None => Ok(None),
            Some(value) => value
                .clone()
                .into_string()
                .map(Some)
                .map_err(|_| WidgetError::invalid_field(self.path, key, "must be a string")),
        }
    }

    fn required_string(&self, key: &str) -> WidgetResult<String> {
        self.string(key)?
            .ok_or_else(|| WidgetError::missing_field(self.path, key))
    }

    fn dimension(&self, key: &str) -> WidgetResult<u32> {
        let value = self
            .present(key)
            .ok_or_else(|| WidgetError::missing_field(self.path, key))?;
        let number = number_of(value)
            .ok_or_else(|| WidgetError::invalid_field(self.path, key, "must be a number"))?;
        if !(number >= 1.0 && number <= MAX_DIMENSION as f64) {
            return Err(WidgetError::invalid_field(
                self.path,
                key,
                format!("must be between 1 and {MAX_DIMENSION}, got {number}"),
            ));
        }
        Ok(number.round() as u32)
    }

    fn flag(&self, key: &str, default: bool) -> WidgetResult<bool> {
        match self.present(key) {
            None => Ok(default),
            Some(value) => value
                .as_bool()
                .map_err(|_| WidgetError::invalid_field(self.path, key, "must be true or false")),
        }
    }

    fn level(&self) -> WidgetResult<DesktopLevel> {
        match self.string("desktopLevel")? {
            None => Ok(DesktopLevel::Top),
            Some(level) => level
                .parse()
                .map_err(|reason: String| WidgetError::invalid_field(self.path, "desktopLevel", reason)),
        }
    }

    fn callback(&self, key: &str) -> WidgetResult<Option<FnPtr>> {
        match self.present(key) {
            None => Ok(None),
            Some(value) => value
                .clone()
                .try_cast::<FnPtr>()
                .map(Some)
                .ok_or_else(|| {
                    WidgetError::invalid_field(
                        self.path,
                        key,
                        format!("must be a function, got {}", value.type_name()),
                    )
                }),
        }
    }

    fn settings(&self) -> WidgetResult<Vec<SettingDefinition>> {
        let Some(value) = self.present("settings") else {
            return Ok(Vec::new());
        };
        let entries = value
            .clone()
            .try_cast::<Array>()
            .ok_or_else(|| WidgetError::invalid_field(self.path, "settings", "must be an array"))?;

        let mut definitions = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            let definition = self.setting_definition(entry).map_err(|reason| {
                WidgetError::invalid_field(self.path, "settings", format!("entry {index}: {reason}"))
            })?;
            if definitions
                .iter()
                .any(|existing: &SettingDefinition| existing.key == definition.key)
            {
                return Err(WidgetError::invalid_field(
                    self.path,
                    "settings",
                    format!("duplicate key \"{}\"", definition.key),
                ));
            }
            definitions.push(definition);
        }
        Ok(definitions)
    }

    fn setting_definition(&self, entry: Dynamic) -> Result<SettingDefinition, String> {
        let map = entry
            .try_cast::<Map>()
            .ok_or_else(|| "must be an object map".to_string())?;
        let text = |key: &str| -> Result<Option<String>, String> {
            match map.get(key).filter(|v| !v.is_unit()) {
                None => Ok(None),
                Some(v) => v
                    .clone()
                    .into_string()
                    .map(Some)
                    .map_err(|_| format!("\"{key}\" must be a string")),
            }
        };
        let number = |key: &str| -> Result<Option<f64>, String> {
            match map.get(key).filter(|v| !v.is_unit()) {
                None => Ok(None),
                Some(v) => number_of(v)
                    .map(Some)
                    .ok_or_else(|| format!("\"{key}\" must be a number")),
            }
        };

        let key = text("key")?
            .filter(|key| !key.is_empty())
            .ok_or_else(|| "missing \"key\"".to_string())?;
        let label = text("label")?.unwrap_or_else(|| key.clone());
        let kind = match text("type")? {
            Some(kind) => kind.parse::<SettingKind>()?,
            None => SettingKind::Text,
        };
        let default = match map.get("default") {
            Some(value) => rhai::serde::from_dynamic::<Value>(value).map_err(|err| err.to_string())?,
            None => Value::Null,
        };
        let options = match map.get("options").filter(|v| !v.is_unit()) {
            None => Vec::new(),
            Some(value) => value
                .clone()
                .try_cast::<Array>()
                .ok_or_else(|| "\"options\" must be an array".to_string())?
                .into_iter()
                .map(|option| option.into_string().map_err(|_| "options must be strings".to_string()))
                .collect::<Result<Vec<_>, _>>()?,
        };

        let definition = SettingDefinition {
            key,
            label,
            kind,
            default,
            min: number("min")?,
            max: number("max")?,
            step: number("step")?,
            options,
        };
        if kind == SettingKind::Select && definition.options.is_empty() {
            return Err("select settings need options".to_string());
        }
        if !definition.default.is_null() {
            definition
                .validate(&definition.default)
                .map_err(|err| format!("default rejected: {err}"))?;
        }
        Ok(definition)
    }
}

fn number_of(value: &Dynamic) -> Option<f64> {
    if let Ok(int) = value.as_int() {
        return Some(int as f64);
    }
    value.as_float().ok()
}

fn build_descriptor(
    sandbox: &ScriptSandbox,
    ast: &Arc<AST>,
    path: &Path,
    map: Map,
) -> WidgetResult<WidgetDescriptor> {
    // Fields missing here get the same values the SDK factory would supply.
    let fields = Fields {
        path,
        map: apply_factory_defaults(map),
    };
    fields.check_required()?;

    let manifest = WidgetManifest {
        name: fields.required_string("name")?,
        version: fields.required_string("version")?,
        author: fields.required_string("author")?,
        description: fields.string("description")?,
        width: fields.dimension("width")?,
        height: fields.dimension("height")?,
        transparent: fields.flag("transparent", true)?,
        always_on_top: fields.flag("alwaysOnTop", true)?,
        desktop_level: fields.level()?,
        resizable: fields.flag("resizable", false)?,
        click_through: fields.flag("clickThrough", false)?,
        settings: fields.settings()?,
        styles: fields.string("styles")?,
    };

    let bind = |key: &str, name: &'static str| -> WidgetResult<Option<Arc<ScriptCallback>>> {
        Ok(fields.callback(key)?.map(|func| {
            Arc::new(ScriptCallback::new(
                Arc::clone(sandbox.engine()),
                Arc::clone(ast),
                func,
                PathBuf::from(path),
                name,
            ))
        }))
    };

    let hooks = WidgetHooks {
        render: bind("render", "render")?.map(|cb| cb as Arc<dyn nxui_core::RenderFn>),
        on_mount: bind("onMount", "onMount")?.map(|cb| cb as Arc<dyn nxui_core::LifecycleHook>),
        on_destroy: bind("onDestroy", "onDestroy")?.map(|cb| cb as Arc<dyn nxui_core::LifecycleHook>),
        on_resize: bind("onResize", "onResize")?.map(|cb| cb as Arc<dyn nxui_core::LifecycleHook>),
    };

    Ok(WidgetDescriptor { manifest, hooks })
}
