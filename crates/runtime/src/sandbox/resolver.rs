//! Import resolution for widget scripts.
//!
//! The only capability a widget can import is the SDK module, which exposes a
//! single `define_widget` factory. Other SDK-looking paths get an empty module
//! and everything else is loaded as a plain script file.

use rhai::module_resolvers::FileModuleResolver;
use rhai::{
    Dynamic, Engine, EvalAltResult, ImmutableString, Map, Module, ModuleResolver, Position, Shared,
};

pub const SDK_IMPORT: &str = "nxui/sdk";
pub const DEFINE_FN: &str = "define_widget";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Sdk,
    Stub,
    Passthrough,
}

pub fn classify_import(path: &str) -> ImportKind {
    if path.contains("sdk/define") || path.contains(SDK_IMPORT) {
        ImportKind::Sdk
    } else if path.contains("sdk") {
        ImportKind::Stub
    } else {
        ImportKind::Passthrough
    }
}

/// Fill in every factory default the widget did not set explicitly.
pub fn apply_factory_defaults(mut config: Map) -> Map {
    let defaults: [(&str, Dynamic); 5] = [
        ("transparent", Dynamic::TRUE),
        ("alwaysOnTop", Dynamic::TRUE),
        ("desktopLevel", Dynamic::from(ImmutableString::from("top"))),
        ("resizable", Dynamic::FALSE),
        ("clickThrough", Dynamic::FALSE),
    ];
    for (key, value) in defaults {
        config.entry(key.into()).or_insert(value);
    }
    config
}

pub struct SdkResolver {
    sdk: Shared<Module>,
    stub: Shared<Module>,
    passthrough: FileModuleResolver,
}

impl SdkResolver {
    pub fn new() -> Self {
        let mut sdk = Module::new();
        sdk.set_native_fn(DEFINE_FN, |config: Map| Ok(apply_factory_defaults(config)));
        sdk.build_index();

        let mut stub = Module::new();
        stub.build_index();

        let mut passthrough = FileModuleResolver::new();
        // Widgets are reloaded from disk, so imported files must be too.
        passthrough.enable_cache(false);

        Self {
            sdk: Shared::new(sdk),
            stub: Shared::new(stub),
            passthrough,
        }
    }
}

impl Default for SdkResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleResolver for SdkResolver {
    fn resolve(
        &self,
        engine: &Engine,
        source: Option<&str>,
        path: &str,
        pos: Position,
    ) -> Result<Shared<Module>, Box<EvalAltResult>> {
        match classify_import(path) {
            ImportKind::Sdk => Ok(self.sdk.clone()),
            ImportKind::Stub => {
                tracing::debug!("Widget import '{}' resolved to an empty module", path);
                Ok(self.stub.clone())
            }
            ImportKind::Passthrough => self.passthrough.resolve(engine, source, path, pos),
        }
    }
}
