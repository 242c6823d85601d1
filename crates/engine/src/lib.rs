//! NxUI orchestration: the widget manager, its control plane and themes.

pub mod commands;
pub mod keyed_locks;
pub mod manager;
pub mod themes;

pub use commands::{Command, CommandResponse, CommandRouter};
pub use keyed_locks::{KeyGuard, KeyedLocks};
pub use manager::{ScanReport, WidgetManager};
pub use themes::{find_theme, list_themes, Theme, ThemeInfo};
