use nxui_core::convention::{is_hidden, single_file_id, ENTRY_FILE};
use nxui_core::{SourceKind, WidgetResult, WidgetSource};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Enumerates widget sources directly under a root directory.
#[derive(Debug, Clone)]
pub struct SourceScanner {
    root: PathBuf,
}

impl SourceScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All sources currently present, ordered by identifier.
    ///
    /// A missing root yields an empty list. Folder widgets win over a
    /// single-file widget with the same identifier.
    pub async fn scan(&self) -> WidgetResult<Vec<WidgetSource>> {
        if !fs::try_exists(&self.root).await.unwrap_or(false) {
            tracing::debug!("Widget root {} does not exist", self.root.display());
            return Ok(Vec::new());
        }

        let mut found: BTreeMap<String, WidgetSource> = BTreeMap::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if is_hidden(name) {
                continue;
            }

            let file_type = entry.file_type().await?;
            let source = if file_type.is_dir() {
                if !fs::try_exists(entry.path().join(ENTRY_FILE)).await.unwrap_or(false) {
                    continue;
                }
                WidgetSource::folder(&self.root, name)
            } else if let Some(id) = single_file_id(name) {
                WidgetSource::single_file(&self.root, id)
            } else {
                continue;
            };

            match found.get(&source.id) {
                Some(existing) if existing.kind == SourceKind::Folder => {
                    tracing::warn!(
                        "Ignoring {} because folder widget '{}' already exists",
                        source.entry_path.display(),
                        source.id
                    );
                }
                _ => {
                    found.insert(source.id.clone(), source);
                }
            }
        }

        Ok(found.into_values().collect())
    }

    pub async fn find(&self, id: &str) -> WidgetResult<Option<WidgetSource>> {
        Ok(self.scan().await?.into_iter().find(|source| source.id == id))
    }
}
