//! Filesystem watch over the widget root.
//!
//! Raw notifications are collapsed per widget identifier and only emitted once
//! the source has been quiet for the stability window.

mod settle;
mod watcher;

pub use settle::{WatchEvent, WatchEventKind};
pub use watcher::{WatcherConfig, WidgetWatcher};
