//! Widget runtime: discovers widget sources, runs them in a script sandbox
//! and reconciles the result with persisted state.

pub mod loader;
pub mod reconciler;
pub mod sandbox;
pub mod scanner;

pub use loader::ScriptLoader;
pub use reconciler::{default_position, StateReconciler};
pub use sandbox::{SandboxLimits, ScriptSandbox};
pub use scanner::SourceScanner;
