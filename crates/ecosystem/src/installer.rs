use crate::archive::extract_widget_archive;
use crate::registry::{RegistryClient, RegistryEntry};
use nxui_core::convention::{ENTRY_FILE, STYLES_FILE, TEMPLATE_FILE};
use nxui_core::{WidgetError, WidgetResult, WidgetSource};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Download URL that makes the installer generate a placeholder widget.
pub const MOCK_DOWNLOAD: &str = "mock";

const MOCK_STYLES: &str = r#".mock-store-widget {
  width: 100%; height: 100%;
  background: var(--nxui-surface);
  border: 1px solid var(--nxui-accent);
  border-radius: 12px;
  display: flex; flex-direction: column;
  align-items: center; justify-content: center;
  color: var(--nxui-text);
  font-family: sans-serif;
  box-shadow: 0 0 20px var(--nxui-accent-glow);
}
"#;

pub fn validate_widget_id(id: &str) -> WidgetResult<()> {
    if id.is_empty() {
        return Err(WidgetError::Install("widget id cannot be empty".to_string()));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(WidgetError::Install(format!(
            "invalid widget id \"{id}\": only letters, digits, '-' and '_' are allowed"
        )));
    }
    Ok(())
}

fn mock_entry_script(id: &str) -> String {
    format!(
        r#"import "nxui/sdk" as sdk;

sdk::define_widget(#{{
    name: "{name}",
    version: "1.0.0",
    author: "Store",
    description: "Installed from Store",
    width: 280,
    height: 160,
}})
"#,
        name = id.to_uppercase()
    )
}

fn mock_template(id: &str) -> String {
    format!(
        r#"<div class="mock-store-widget">
  <h3 style="color:var(--nxui-accent); margin-bottom:8px;">Store Widget</h3>
  <p style="font-size:12px; opacity:0.7">ID: {id}</p>
  <div style="margin-top:16px; padding:6px 12px; background:var(--nxui-success); border-radius:20px; font-size:11px; color:#000; font-weight:bold;">
    &#10003; Installed Successfully
  </div>
</div>
"#
    )
}

/// Writes and deletes widget sources under the widgets root.
pub struct WidgetInstaller {
    widgets_dir: PathBuf,
    registry: RegistryClient,
}

impl WidgetInstaller {
    pub fn new(widgets_dir: impl Into<PathBuf>, registry: RegistryClient) -> Self {
        Self {
            widgets_dir: widgets_dir.into(),
            registry,
        }
    }

    pub fn registry(&self) -> &RegistryClient {
        &self.registry
    }

    pub fn widgets_dir(&self) -> &Path {
        &self.widgets_dir
    }

    /// Install `entry` as a folder widget and return its source.
    pub async fn install(&self, entry: &RegistryEntry) -> WidgetResult<WidgetSource> {
        validate_widget_id(&entry.id)?;
        let source = WidgetSource::folder(&self.widgets_dir, &entry.id);
        let target = source.install_path().to_path_buf();
        let created = !fs::try_exists(&target).await.unwrap_or(false);

        let result = if entry.download_url == MOCK_DOWNLOAD {
            self.write_mock(&entry.id, &target).await
        } else {
            self.download_and_extract(&entry.download_url, &target).await
        };
        let result = match result {
            Ok(()) if !source.entry_path.is_file() => Err(WidgetError::Install(format!(
                "package for '{}' has no {}",
                entry.id, ENTRY_FILE
            ))),
            other => other,
        };

        if let Err(e) = result {
            tracing::error!("Failed to install {}: {}", entry.id, e);
            if created {
                if let Err(cleanup) = fs::remove_dir_all(&target).await {
                    tracing::warn!("Could not remove partial install {}: {}", target.display(), cleanup);
                }
            }
            return Err(match e {
                WidgetError::Install(_) => e,
                other => WidgetError::Install(other.to_string()),
            });
        }

        tracing::info!("Installed widget {} {}", entry.id, entry.version);
        Ok(source)
    }

    async fn write_mock(&self, id: &str, target: &Path) -> WidgetResult<()> {
        if fs::try_exists(target.join(ENTRY_FILE)).await.unwrap_or(false) {
            tracing::debug!("Mock widget {} already present", id);
            return Ok(());
        }
        fs::create_dir_all(target).await?;
        fs::write(target.join(STYLES_FILE), MOCK_STYLES).await?;
        fs::write(target.join(TEMPLATE_FILE), mock_template(id)).await?;
        // Companions must exist before the entry appears.
        fs::write(target.join(ENTRY_FILE), mock_entry_script(id)).await?;
        Ok(())
    }

    async fn download_and_extract(&self, url: &str, target: &Path) -> WidgetResult<()> {
        let response = self
            .registry
            .http()
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| WidgetError::Install(format!("download failed: {e}")))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| WidgetError::Install(format!("download failed: {e}")))?;

        let target = target.to_path_buf();
        let written = tokio::task::spawn_blocking(move || extract_widget_archive(&bytes, &target))
            .await
            .map_err(|e| WidgetError::Install(format!("extraction task failed: {e}")))??;
        tracing::debug!("Extracted {} files from {}", written, url);
        Ok(())
    }

    /// Delete every on-disk source for `id`. Returns whether anything was removed.
    pub async fn remove_files(&self, id: &str) -> WidgetResult<bool> {
        validate_widget_id(id)?;
        let mut removed = false;

        let folder = WidgetSource::folder(&self.widgets_dir, id);
        let dir = folder.install_path();
        if fs::try_exists(dir).await.unwrap_or(false) {
            fs::remove_dir_all(dir)
                .await
                .map_err(|e| WidgetError::Install(format!("cannot remove {}: {e}", dir.display())))?;
            removed = true;
        }

        let single = WidgetSource::single_file(&self.widgets_dir, id);
        if fs::try_exists(&single.entry_path).await.unwrap_or(false) {
            fs::remove_file(&single.entry_path).await.map_err(|e| {
                WidgetError::Install(format!("cannot remove {}: {e}", single.entry_path.display()))
            })?;
            removed = true;
        }

        if removed {
            tracing::info!("Uninstalled widget {}", id);
        }
        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::registry::builtin_registry;
    use std::time::Duration;
    use tempfile::TempDir;

    fn installer(root: &Path) -> WidgetInstaller {
        let client =
            RegistryClient::new("http://127.0.0.1:1/registry.json", Duration::from_secs(2)).unwrap();
        WidgetInstaller::new(root, client)
    }

    #[test]
    fn test_widget_id_validation() {
        assert!(validate_widget_id("calc-pro").is_ok());
        assert!(validate_widget_id("my_widget2").is_ok());
        assert!(validate_widget_id("").is_err());
        assert!(validate_widget_id("../etc").is_err());
        assert!(validate_widget_id("a b").is_err());
    }

    #[tokio::test]
    async fn test_mock_install_writes_folder_widget() {
        let temp = TempDir::new().unwrap();
        let installer = installer(temp.path());
        let entry = builtin_registry().remove(0);

        let source = installer.install(&entry).await.unwrap();
        assert_eq!(source.id, "calc-pro");
        let script = std::fs::read_to_string(&source.entry_path).unwrap();
        assert!(script.contains("name: \"CALC-PRO\""));
        assert!(script.contains("Installed from Store"));
        assert!(temp.path().join("calc-pro").join(TEMPLATE_FILE).is_file());

        // Second install of the same mock keeps the existing files.
        installer.install(&entry).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_download_cleans_up() {
        let temp = TempDir::new().unwrap();
        let installer = installer(temp.path());
        let mut entry = builtin_registry().remove(1);
        entry.download_url = "http://127.0.0.1:1/crypto.zip".to_string();

        let err = installer.install(&entry).await.unwrap_err();
        assert!(matches!(err, WidgetError::Install(_)));
        assert!(!temp.path().join("crypto-ticker").exists());
    }

    #[tokio::test]
    async fn test_invalid_id_is_rejected_before_touching_disk() {
        let temp = TempDir::new().unwrap();
        let installer = installer(temp.path());
        let mut entry = builtin_registry().remove(0);
        entry.id = "../escape".to_string();

        assert!(installer.install(&entry).await.is_err());
        assert!(!temp.path().join("..").join("escape").exists());
    }

    #[tokio::test]
    async fn test_remove_files_handles_both_layouts() {
        let temp = TempDir::new().unwrap();
        let installer = installer(temp.path());
        std::fs::create_dir(temp.path().join("clock")).unwrap();
        std::fs::write(temp.path().join("clock").join(ENTRY_FILE), "").unwrap();
        std::fs::write(temp.path().join("notes.widget.rhai"), "").unwrap();

        assert!(installer.remove_files("clock").await.unwrap());
        assert!(installer.remove_files("notes").await.unwrap());
        assert!(!installer.remove_files("notes").await.unwrap());
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }
}
