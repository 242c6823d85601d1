//! Runtime assembly: store, loader, headless presentation, manager, watcher
//! and the command router, wired from one [`Config`].

use crate::config::Config;
use anyhow::{Context, Result};
use nxui_core::SurfaceEvent;
use nxui_ecosystem::{RegistryClient, WidgetInstaller};
use nxui_engine::{CommandRouter, ScanReport, WidgetManager};
use nxui_runtime::ScriptLoader;
use nxui_store::SettingsStore;
use nxui_surfaces::{HeadlessBackend, StaticDisplay};
use nxui_watcher::WidgetWatcher;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;

pub struct App {
    manager: Arc<WidgetManager>,
    installer: Arc<WidgetInstaller>,
    backend: Arc<HeadlessBackend>,
    watcher: Option<WidgetWatcher>,
    surface_events: UnboundedSender<(String, SurfaceEvent)>,
    tasks: Vec<JoinHandle<()>>,
    report: ScanReport,
}

impl App {
    /// Load every widget, then start watching the widgets directory.
    pub async fn start(config: &Config) -> Result<Self> {
        let store = Arc::new(SettingsStore::open(&config.settings_file));
        let backend = Arc::new(HeadlessBackend::new());
        let manager = WidgetManager::new(
            config.widgets_dir.clone(),
            Arc::new(ScriptLoader::new(config.sandbox)),
            store,
            backend.clone(),
            Arc::new(StaticDisplay(config.work_area)),
        )
        .with_snap_threshold(config.snap_threshold)
        .with_batch_timing(config.batch_timing());
        let manager = Arc::new(manager);

        let report = manager.initialize().await;
        tracing::info!(
            "Loaded {} widget(s), {} failed",
            report.loaded.len(),
            report.failed.len()
        );

        let mut tasks = Vec::new();
        let (surface_tx, surface_rx) = mpsc::unbounded_channel();
        tasks.push(tokio::spawn(Arc::clone(&manager).run_surface_events(surface_rx)));

        // Seed with everything on disk so a widget that failed to load is
        // reported as changed, not added, once it is fixed.
        let mut known: HashSet<String> = manager.ids().into_iter().collect();
        known.extend(report.failed.iter().map(|(id, _)| id.clone()));
        let (watch_tx, watch_rx) = mpsc::unbounded_channel();
        let watcher = WidgetWatcher::start(&config.widgets_dir, known, config.watcher(), watch_tx)
            .context("Failed to watch the widgets directory")?;
        tasks.push(tokio::spawn(Arc::clone(&manager).run_watch_loop(watch_rx)));

        let registry = RegistryClient::new(config.registry_url.clone(), config.registry_timeout())
            .context("Failed to build the registry client")?;
        let installer = Arc::new(WidgetInstaller::new(config.widgets_dir.clone(), registry));

        Ok(Self {
            manager,
            installer,
            backend,
            watcher: Some(watcher),
            surface_events: surface_tx,
            tasks,
            report,
        })
    }

    pub fn manager(&self) -> &Arc<WidgetManager> {
        &self.manager
    }

    pub fn backend(&self) -> &Arc<HeadlessBackend> {
        &self.backend
    }

    pub fn report(&self) -> &ScanReport {
        &self.report
    }

    /// Sender for geometry feedback from the presentation layer.
    pub fn surface_events(&self) -> UnboundedSender<(String, SurfaceEvent)> {
        self.surface_events.clone()
    }

    pub fn router(&self) -> CommandRouter {
        CommandRouter::new(Arc::clone(&self.manager)).with_installer(Arc::clone(&self.installer))
    }

    /// Stop watching and the event loops, then destroy every surface.
    pub async fn shutdown(mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            watcher.stop();
        }
        for task in &self.tasks {
            task.abort();
        }
        // Queued events must not recreate surfaces after teardown.
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::warn!("Event loop ended abnormally: {}", e);
                }
            }
        }
        self.manager.shutdown().await;
        tracing::info!("NxUI stopped");
    }
}
