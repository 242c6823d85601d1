//! Script sandbox for widget sources.

pub mod hooks;
pub mod limits;
pub mod resolver;

pub use hooks::ScriptCallback;
pub use limits::SandboxLimits;
pub use resolver::{apply_factory_defaults, classify_import, ImportKind, SdkResolver, SDK_IMPORT};

use nxui_core::{WidgetError, WidgetResult};
use rhai::{Dynamic, Engine, Scope, AST};
use std::path::Path;
use std::sync::Arc;

/// A configured script engine shared by every widget load.
///
/// Each load gets its own compiled unit and its own scope, so widgets never
/// see each other's globals.
pub struct ScriptSandbox {
    engine: Arc<Engine>,
}

impl ScriptSandbox {
    pub fn new(limits: SandboxLimits) -> Self {
        let mut engine = Engine::new();
        limits.apply(&mut engine);
        engine.set_module_resolver(SdkResolver::new());
        engine.on_print(|text| tracing::info!(target: "nxui::widget", "{}", text));
        engine.on_debug(|text, source, pos| {
            tracing::debug!(
                target: "nxui::widget",
                source = source.unwrap_or("<widget>"),
                "{} @ {}",
                text,
                pos
            );
        });

        Self {
            engine: Arc::new(engine),
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn compile(&self, path: &Path, source: &str) -> WidgetResult<AST> {
        let mut ast = self
            .engine
            .compile(source)
            .map_err(|err| WidgetError::Compile {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
        ast.set_source(path.to_string_lossy().to_string());
        Ok(ast)
    }

    /// Run a compiled unit in a fresh scope and return its final value.
    pub fn execute(&self, path: &Path, ast: &AST) -> WidgetResult<Dynamic> {
        let mut scope = Scope::new();
        self.engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, ast)
            .map_err(|err| WidgetError::Execution {
                path: path.to_path_buf(),
                message: err.to_string(),
            })
    }
}

impl Default for ScriptSandbox {
    fn default() -> Self {
        Self::new(SandboxLimits::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn path() -> PathBuf {
        PathBuf::from("/widgets/test.widget.rhai")
    }

    #[test]
    fn test_compile_error_is_reported_with_path() {
        let sandbox = ScriptSandbox::default();
        let err = sandbox.compile(&path(), "let x = ;").unwrap_err();
        match err {
            WidgetError::Compile { path: p, message } => {
                assert_eq!(p, path());
                assert!(!message.is_empty());
            }
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    #[test]
    fn test_runtime_throw_becomes_execution_error() {
        let sandbox = ScriptSandbox::default();
        let ast = sandbox.compile(&path(), r#"throw "boom";"#).unwrap();
        let err = sandbox.execute(&path(), &ast).unwrap_err();
        assert!(matches!(err, WidgetError::Execution { ref message, .. } if message.contains("boom")));
    }

    #[test]
    fn test_runaway_loop_is_contained() {
        let sandbox = ScriptSandbox::new(SandboxLimits {
            max_operations: 10_000,
            ..SandboxLimits::default()
        });
        let ast = sandbox.compile(&path(), "loop { }").unwrap();
        assert!(matches!(
            sandbox.execute(&path(), &ast),
            Err(WidgetError::Execution { .. })
        ));
    }

    #[test]
    fn test_sdk_factory_is_injected() {
        let sandbox = ScriptSandbox::default();
        let script = r#"
            import "nxui/sdk" as sdk;
            sdk::define_widget(#{ name: "Probe" })
        "#;
        let ast = sandbox.compile(&path(), script).unwrap();
        let map = sandbox.execute(&path(), &ast).unwrap().try_cast::<rhai::Map>().unwrap();
        assert_eq!(map["desktopLevel"].clone().into_string().unwrap(), "top");
        assert!(map["alwaysOnTop"].as_bool().unwrap());
    }

    #[test]
    fn test_other_sdk_imports_are_empty_stubs() {
        let sandbox = ScriptSandbox::default();
        let script = r#"
            import "nxui-extras/sdk-internal" as internal;
            42
        "#;
        let ast = sandbox.compile(&path(), script).unwrap();
        assert_eq!(sandbox.execute(&path(), &ast).unwrap().as_int().unwrap(), 42);
    }
}
