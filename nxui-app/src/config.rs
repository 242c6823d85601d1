use anyhow::{bail, Context, Result};
use nxui_core::Rect;
use nxui_ecosystem::DEFAULT_REGISTRY_URL;
use nxui_runtime::SandboxLimits;
use nxui_store::SETTINGS_FILE;
use nxui_surfaces::BatchTiming;
use nxui_watcher::WatcherConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR: &str = "nxui";
const CONFIG_FILE: &str = "config.yaml";

pub const ENV_WIDGETS_DIR: &str = "NXUI_WIDGETS_DIR";
pub const ENV_REGISTRY_URL: &str = "NXUI_REGISTRY_URL";
pub const ENV_LOG: &str = "NXUI_LOG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub widgets_dir: PathBuf,
    pub settings_file: PathBuf,
    pub snap_threshold: u32,
    pub watch_stability_ms: u64,
    pub watch_poll_interval_ms: u64,
    pub batch_step_ms: u64,
    pub hide_settle_ms: u64,
    pub registry_url: String,
    pub registry_timeout_secs: u64,
    pub log_filter: String,
    pub work_area: Rect,
    pub sandbox: SandboxLimits,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            widgets_dir: home.join("NxUI").join("widgets"),
            settings_file: config_dir().join(SETTINGS_FILE),
            snap_threshold: 20,
            watch_stability_ms: 500,
            watch_poll_interval_ms: 100,
            batch_step_ms: 50,
            hide_settle_ms: 400,
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            registry_timeout_secs: 10,
            log_filter: "info".to_string(),
            work_area: Rect::new(0, 0, 1920, 1080),
            sandbox: SandboxLimits::default(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
}

impl Config {
    pub fn default_path() -> PathBuf {
        config_dir().join(CONFIG_FILE)
    }

    /// Read the file at `path` if present, then apply environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_WIDGETS_DIR).filter(|v| !v.trim().is_empty()) {
            self.widgets_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup(ENV_REGISTRY_URL).filter(|v| !v.trim().is_empty()) {
            self.registry_url = url;
        }
        if let Some(filter) = lookup(ENV_LOG).filter(|v| !v.trim().is_empty()) {
            self.log_filter = filter;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.widgets_dir.as_os_str().is_empty() {
            bail!("widgets_dir cannot be empty");
        }
        if self.settings_file.as_os_str().is_empty() {
            bail!("settings_file cannot be empty");
        }
        if self.snap_threshold == 0 {
            bail!("snap_threshold must be greater than zero");
        }
        if self.watch_stability_ms == 0 {
            bail!("watch_stability_ms must be greater than zero");
        }
        if self.watch_poll_interval_ms == 0 {
            bail!("watch_poll_interval_ms must be greater than zero");
        }
        if self.registry_url.trim().is_empty() {
            bail!("registry_url cannot be empty");
        }
        if self.registry_timeout_secs == 0 {
            bail!("registry_timeout_secs must be greater than zero");
        }
        if self.work_area.width == 0 || self.work_area.height == 0 {
            bail!("work_area must have a non-zero size");
        }
        Ok(())
    }

    pub fn watcher(&self) -> WatcherConfig {
        WatcherConfig {
            stability_window: Duration::from_millis(self.watch_stability_ms),
            poll_interval: Duration::from_millis(self.watch_poll_interval_ms),
        }
    }

    pub fn batch_timing(&self) -> BatchTiming {
        BatchTiming {
            step: Duration::from_millis(self.batch_step_ms),
            settle: Duration::from_millis(self.hide_settle_ms),
        }
    }

    pub fn registry_timeout(&self) -> Duration {
        Duration::from_secs(self.registry_timeout_secs)
    }
}
