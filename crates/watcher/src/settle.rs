use nxui_core::{classify_path, PathRole, WidgetSource};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchEventKind {
    Added,
    Changed,
    Removed,
}

/// A settled change to one widget source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub id: String,
    /// Entry file for adds and changes, last known location for removals.
    pub path: PathBuf,
}

/// What kind of path produced a pending change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
    /// Entry file or companion.
    Content,
    /// Only the top-level widget directory itself.
    Directory,
}

impl Trigger {
    pub(crate) fn merge(self, other: Trigger) -> Trigger {
        if self == Trigger::Content || other == Trigger::Content {
            Trigger::Content
        } else {
            Trigger::Directory
        }
    }
}

/// Map a raw filesystem path to the widget it affects.
pub(crate) fn affected_widget(root: &Path, path: &Path) -> Option<(String, Trigger)> {
    match classify_path(root, path)? {
        PathRole::Entry(source) => Some((source.id, Trigger::Content)),
        PathRole::Companion { id } => Some((id, Trigger::Content)),
        PathRole::FolderRoot { id } => Some((id, Trigger::Directory)),
    }
}

/// Entry currently on disk for `id`. A folder widget shadows a single file.
pub(crate) fn resolve_source(root: &Path, id: &str) -> Option<WidgetSource> {
    [WidgetSource::folder(root, id), WidgetSource::single_file(root, id)]
        .into_iter()
        .find(|source| source.entry_path.is_file())
}

/// Decide which event, if any, a quiet widget produces, updating `known`.
pub(crate) fn settle(
    root: &Path,
    id: &str,
    trigger: Trigger,
    known: &mut HashSet<String>,
) -> Option<WatchEvent> {
    match resolve_source(root, id) {
        Some(source) if known.contains(id) => {
            if trigger == Trigger::Directory {
                return None;
            }
            Some(WatchEvent {
                kind: WatchEventKind::Changed,
                id: id.to_string(),
                path: source.entry_path,
            })
        }
        Some(source) => {
            known.insert(id.to_string());
            Some(WatchEvent {
                kind: WatchEventKind::Added,
                id: id.to_string(),
                path: source.entry_path,
            })
        }
        None if known.remove(id) => Some(WatchEvent {
            kind: WatchEventKind::Removed,
            id: id.to_string(),
            path: root.join(id),
        }),
        None => None,
    }
}
