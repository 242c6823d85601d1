//! NxUI desktop widget runtime: application shell.

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod logging;
pub mod repl;
pub mod stats;

pub use app::App;
pub use config::Config;
