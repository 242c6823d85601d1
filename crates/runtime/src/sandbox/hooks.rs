use nxui_core::{LifecycleHook, RenderFn, WidgetError, WidgetResult};
use rhai::{Dynamic, Engine, FnPtr, AST};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// A function value exported by a widget script, bound to the unit that defined it.
pub struct ScriptCallback {
    engine: Arc<Engine>,
    ast: Arc<AST>,
    func: FnPtr,
    path: PathBuf,
    name: &'static str,
}

impl ScriptCallback {
    pub fn new(
        engine: Arc<Engine>,
        ast: Arc<AST>,
        func: FnPtr,
        path: PathBuf,
        name: &'static str,
    ) -> Self {
        Self {
            engine,
            ast,
            func,
            path,
            name,
        }
    }

    fn call(&self, args: Vec<Dynamic>) -> WidgetResult<Dynamic> {
        self.func
            .call::<Dynamic>(&self.engine, &self.ast, args)
            .map_err(|err| WidgetError::Execution {
                path: self.path.clone(),
                message: format!("{} failed: {}", self.name, err),
            })
    }
}

impl RenderFn for ScriptCallback {
    fn render(&self) -> WidgetResult<String> {
        let output = self.call(Vec::new())?;
        if output.is_unit() {
            return Ok(String::new());
        }
        Ok(match output.clone().into_string() {
            Ok(markup) => markup,
            Err(_) => output.to_string(),
        })
    }
}

impl LifecycleHook for ScriptCallback {
    fn invoke(&self, args: Vec<Value>) -> WidgetResult<()> {
        let args = args
            .iter()
            .map(rhai::serde::to_dynamic)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| WidgetError::Execution {
                path: self.path.clone(),
                message: format!("{} arguments rejected: {}", self.name, err),
            })?;
        self.call(args).map(|_| ())
    }
}
