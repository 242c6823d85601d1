//! On-disk naming convention for widget sources.
//!
//! A widget is either a folder `<root>/<id>/widget.rhai` (with optional
//! `template.html` and `styles.css` siblings) or a single file
//! `<root>/<id>.widget.rhai`. Both the scanner and the change watcher derive
//! identifiers through this module so the two never disagree.

use serde::Serialize;
use std::path::{Component, Path, PathBuf};

pub const ENTRY_FILE: &str = "widget.rhai";
pub const SINGLE_FILE_SUFFIX: &str = ".widget.rhai";
pub const TEMPLATE_FILE: &str = "template.html";
pub const STYLES_FILE: &str = "styles.css";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Folder,
    SingleFile,
}

/// A discovered widget source unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetSource {
    pub id: String,
    pub entry_path: PathBuf,
    /// Folder holding template/style companions. Only set for folder widgets.
    pub companion_dir: Option<PathBuf>,
    pub kind: SourceKind,
}

impl WidgetSource {
    pub fn folder(root: &Path, id: &str) -> Self {
        let dir = root.join(id);
        Self {
            id: id.to_string(),
            entry_path: dir.join(ENTRY_FILE),
            companion_dir: Some(dir),
            kind: SourceKind::Folder,
        }
    }

    pub fn single_file(root: &Path, id: &str) -> Self {
        Self {
            id: id.to_string(),
            entry_path: root.join(format!("{id}{SINGLE_FILE_SUFFIX}")),
            companion_dir: None,
            kind: SourceKind::SingleFile,
        }
    }

    /// Path removed on uninstall: the whole folder, or the single file.
    pub fn install_path(&self) -> &Path {
        self.companion_dir.as_deref().unwrap_or(&self.entry_path)
    }
}

pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Identifier encoded in a single-file widget name, if it follows the convention.
pub fn single_file_id(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(SINGLE_FILE_SUFFIX)
        .filter(|id| !id.is_empty() && !is_hidden(id))
}

/// What a path under the widget root means to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathRole {
    /// A recognized entry-point file.
    Entry(WidgetSource),
    /// Template or style sibling of a folder widget.
    Companion { id: String },
    /// A direct child of the root that may be a folder widget directory.
    FolderRoot { id: String },
}

pub fn classify_path(root: &Path, path: &Path) -> Option<PathRole> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    if parts.iter().any(|part| is_hidden(part)) {
        return None;
    }

    match parts.as_slice() {
        [name] => match single_file_id(name) {
            Some(id) => Some(PathRole::Entry(WidgetSource::single_file(root, id))),
            None => Some(PathRole::FolderRoot {
                id: (*name).to_string(),
            }),
        },
        [dir, file] if *file == ENTRY_FILE => Some(PathRole::Entry(WidgetSource::folder(root, dir))),
        [dir, file] if *file == TEMPLATE_FILE || *file == STYLES_FILE => Some(PathRole::Companion {
            id: (*dir).to_string(),
        }),
        _ => None,
    }
}
