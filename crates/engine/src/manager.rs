//! Widget orchestrator.
//!
//! Owns the identifier → instance table and drives scanner, loader,
//! reconciler and surface controller for every transition. Mutations of one
//! identifier are serialized through [`KeyedLocks`] in arrival order, whether
//! they come from the control plane, the change watcher or a profile apply.

use crate::keyed_locks::KeyedLocks;
use crate::themes::{find_theme, list_themes, theme_or_default, ThemeInfo};
use nxui_core::{
    clamp_opacity, DisplayInfo, ProfileSnapshot, ProfileStore, StateRecord, StateStore,
    SurfaceBackend, SurfaceEvent, SurfaceSignal, WidgetError, WidgetInstance, WidgetLoader,
    WidgetResult, WidgetSource, WidgetSummary,
};
use nxui_runtime::{SourceScanner, StateReconciler};
use nxui_surfaces::{BatchAction, BatchTiming, MountContext, SurfaceController};
use nxui_watcher::{WatchEvent, WatchEventKind};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// Outcome of the initial directory scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub loaded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

pub struct WidgetManager {
    root: PathBuf,
    scanner: SourceScanner,
    loader: Arc<dyn WidgetLoader>,
    reconciler: StateReconciler,
    state: Arc<dyn StateStore>,
    profiles: Arc<dyn ProfileStore>,
    surfaces: SurfaceController,
    instances: Mutex<HashMap<String, WidgetInstance>>,
    locks: KeyedLocks,
}

impl WidgetManager {
    pub fn new<S>(
        root: impl Into<PathBuf>,
        loader: Arc<dyn WidgetLoader>,
        store: Arc<S>,
        backend: Arc<dyn SurfaceBackend>,
        display: Arc<dyn DisplayInfo>,
    ) -> Self
    where
        S: StateStore + ProfileStore + 'static,
    {
        let root = root.into();
        let state: Arc<dyn StateStore> = store.clone();
        let profiles: Arc<dyn ProfileStore> = store;
        Self {
            scanner: SourceScanner::new(root.clone()),
            loader,
            reconciler: StateReconciler::new(Arc::clone(&state), Arc::clone(&display)),
            surfaces: SurfaceController::new(backend, Arc::clone(&state), display),
            state,
            profiles,
            instances: Mutex::new(HashMap::new()),
            locks: KeyedLocks::new(),
            root,
        }
    }

    pub fn with_snap_threshold(mut self, threshold: u32) -> Self {
        self.surfaces = self.surfaces.with_snap_threshold(threshold);
        self
    }

    pub fn with_batch_timing(mut self, timing: BatchTiming) -> Self {
        self.surfaces = self.surfaces.with_timing(timing);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn surfaces(&self) -> &SurfaceController {
        &self.surfaces
    }

    pub fn instance(&self, id: &str) -> Option<WidgetInstance> {
        self.instances.lock().get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.instances.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn list_widgets(&self) -> Vec<WidgetSummary> {
        let mut rows: Vec<WidgetSummary> =
            self.instances.lock().values().map(WidgetInstance::summary).collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        rows
    }

    fn update_instance(&self, id: &str, f: impl FnOnce(&mut WidgetInstance)) -> bool {
        match self.instances.lock().get_mut(id) {
            Some(instance) => {
                f(instance);
                true
            }
            None => false,
        }
    }

    fn persist(&self, what: &str, id: &str, result: WidgetResult<()>) {
        if let Err(e) = result {
            tracing::error!("Failed to persist {} for '{}': {}", what, id, e);
        }
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Load every discovered widget, one at a time. Failures are logged and skipped.
    pub async fn initialize(&self) -> ScanReport {
        tracing::info!("Scanning {}", self.root.display());
        let sources = match self.scanner.scan().await {
            Ok(sources) => sources,
            Err(e) => {
                tracing::error!("Widget scan failed: {}", e);
                Vec::new()
            }
        };
        tracing::info!("Found {} widget(s)", sources.len());

        let mut report = ScanReport::default();
        for source in sources {
            let id = source.id.clone();
            match self.load_source(source).await {
                Ok(()) => report.loaded.push(id),
                Err(e) => {
                    tracing::error!("Failed to load '{}': {}", id, e);
                    report.failed.push((id, e.to_string()));
                }
            }
        }
        report
    }

    /// Load (or replace) the instance for `source`.
    pub async fn load_source(&self, source: WidgetSource) -> WidgetResult<()> {
        let _guard = self.locks.acquire(&source.id).await;
        self.load_locked(source).await
    }

    async fn load_locked(&self, source: WidgetSource) -> WidgetResult<()> {
        let id = source.id.clone();
        if self.retire(&id).is_some() {
            tracing::info!("Reloading: {}", id);
        } else {
            tracing::info!("Loading: {}", id);
        }

        let descriptor = self
            .loader
            .load(&source.entry_path, source.companion_dir.as_deref())
            .await?;
        let state = self.reconciler.reconcile(&id, &descriptor.manifest);
        let instance = WidgetInstance {
            id: id.clone(),
            source,
            descriptor: Arc::new(descriptor),
            state,
        };

        if instance.state.enabled {
            let mount = self.mount_context(&instance);
            self.surfaces.create(&instance, mount)?;
        }
        self.instances.lock().insert(id, instance);
        Ok(())
    }

    /// Drop the instance and its surface. Persisted state is untouched.
    fn retire(&self, id: &str) -> Option<WidgetInstance> {
        let instance = self.instances.lock().remove(id);
        self.surfaces
            .destroy(id, instance.as_ref().map(|i| i.descriptor.as_ref()));
        instance
    }

    fn mount_context(&self, instance: &WidgetInstance) -> MountContext {
        MountContext {
            settings: self.effective_settings(instance),
            theme_css: self.theme_css(),
        }
    }

    /// Re-read the widget's source from disk and replace its instance.
    ///
    /// An identifier that is on disk but not loaded (for example after an
    /// earlier compile failure) is loaded as new.
    pub async fn reload_widget(&self, id: &str) -> WidgetResult<()> {
        let _guard = self.locks.acquire(id).await;
        self.reload_locked(id).await
    }

    async fn reload_locked(&self, id: &str) -> WidgetResult<()> {
        match self.scanner.find(id).await? {
            Some(source) => self.load_locked(source).await,
            None => match self.retire(id) {
                Some(stale) => Err(WidgetError::NotFound(stale.source.entry_path)),
                None => Err(WidgetError::UnknownWidget(id.to_string())),
            },
        }
    }

    /// Tear down a widget whose source disappeared. Position and settings are kept.
    pub async fn remove_widget(&self, id: &str) -> bool {
        let _guard = self.locks.acquire(id).await;
        let removed = self.retire(id).is_some();
        if removed {
            tracing::info!("Removed widget: {}", id);
        }
        removed
    }

    /// Tear down a widget and forget everything persisted about it.
    pub async fn uninstall_widget(&self, id: &str) -> bool {
        let _guard = self.locks.acquire(id).await;
        let had_instance = self.retire(id).is_some();
        let had_state = self.state.get(id).is_some();
        self.persist("state removal", id, self.state.remove(id));
        self.persist("settings removal", id, self.state.remove_widget_settings(id));
        had_instance || had_state
    }

    pub async fn handle_watch_event(&self, event: WatchEvent) {
        match event.kind {
            WatchEventKind::Added | WatchEventKind::Changed => {
                if let Err(e) = self.reload_widget(&event.id).await {
                    tracing::error!("[hot-reload] '{}' failed: {}", event.id, e);
                }
            }
            WatchEventKind::Removed => {
                self.remove_widget(&event.id).await;
            }
        }
    }

    /// Consume watcher events until the channel closes.
    pub async fn run_watch_loop(self: Arc<Self>, mut events: UnboundedReceiver<WatchEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_watch_event(event).await;
        }
        tracing::debug!("Watch event loop finished");
    }

    // -----------------------------------------------------------------------
    // Control-plane mutations
    // -----------------------------------------------------------------------

    /// Enable or disable a widget. Returns whether anything changed; unknown ids are a no-op.
    pub async fn toggle_widget(&self, id: &str, enabled: bool) -> WidgetResult<bool> {
        let _guard = self.locks.acquire(id).await;
        let Some(mut instance) = self.instance(id) else {
            return Ok(false);
        };
        let has_surface = self.surfaces.contains(id);
        if instance.state.enabled == enabled && has_surface == enabled {
            return Ok(false);
        }

        instance.state.enabled = enabled;
        if enabled {
            instance.state.hidden = false;
            self.persist("hidden flag", id, self.state.set_hidden(id, false));
            if !has_surface {
                let mount = self.mount_context(&instance);
                self.surfaces.create(&instance, mount)?;
            }
        } else {
            self.surfaces.destroy(id, Some(&instance.descriptor));
        }
        self.persist("enabled flag", id, self.state.set_enabled(id, enabled));
        self.update_instance(id, |current| current.state = instance.state.clone());
        tracing::info!("Widget '{}' {}", id, if enabled { "enabled" } else { "disabled" });
        Ok(true)
    }

    /// Flip drag mode. Returns the new value, or `None` for an unknown id.
    pub async fn toggle_drag(&self, id: &str) -> Option<bool> {
        let _guard = self.locks.acquire(id).await;
        let current = self.instance(id)?.state.draggable;
        self.set_draggable_locked(id, !current)
    }

    pub async fn set_draggable(&self, id: &str, draggable: bool) -> Option<bool> {
        let _guard = self.locks.acquire(id).await;
        self.set_draggable_locked(id, draggable)
    }

    fn set_draggable_locked(&self, id: &str, draggable: bool) -> Option<bool> {
        let click_through = self.instance(id)?.descriptor.manifest.click_through;
        self.surfaces.set_draggable(id, draggable, click_through);
        self.update_instance(id, |instance| instance.state.draggable = draggable);
        Some(draggable)
    }

    /// Clamp and apply opacity. Persisted even while the widget has no surface.
    pub async fn set_opacity(&self, id: &str, requested: f64) -> f64 {
        let _guard = self.locks.acquire(id).await;
        let opacity = self.surfaces.set_opacity(id, requested);
        self.update_instance(id, |instance| instance.state.opacity = opacity);
        opacity
    }

    // -----------------------------------------------------------------------
    // Surface feedback
    // -----------------------------------------------------------------------

    pub async fn handle_surface_event(&self, id: &str, event: SurfaceEvent) {
        let _guard = self.locks.acquire(id).await;
        match event {
            SurfaceEvent::Moved(position) => {
                self.surfaces.record_move(id, position);
                self.update_instance(id, |instance| instance.state.position = position);
            }
            SurfaceEvent::Resized { width, height } => {
                let Some(instance) = self.instance(id) else { return };
                self.surfaces
                    .record_resize(id, width, height, &instance.descriptor);
                self.update_instance(id, |instance| {
                    instance.state.width = Some(width);
                    instance.state.height = Some(height);
                });
            }
            SurfaceEvent::DragEnded => {
                if let Some(position) = self.surfaces.snap(id) {
                    self.update_instance(id, |instance| instance.state.position = position);
                }
            }
            SurfaceEvent::Closed => {
                let descriptor = self.instance(id).map(|i| i.descriptor);
                if self.surfaces.destroy(id, descriptor.as_deref()) {
                    tracing::info!("Surface for '{}' closed externally; disabling", id);
                    self.persist("enabled flag", id, self.state.set_enabled(id, false));
                    self.update_instance(id, |instance| instance.state.enabled = false);
                }
            }
        }
    }

    pub async fn run_surface_events(
        self: Arc<Self>,
        mut events: UnboundedReceiver<(String, SurfaceEvent)>,
    ) {
        while let Some((id, event)) = events.recv().await {
            self.handle_surface_event(&id, event).await;
        }
    }

    // -----------------------------------------------------------------------
    // Settings
    // -----------------------------------------------------------------------

    /// Schema defaults overlaid with stored values.
    fn effective_settings(&self, instance: &WidgetInstance) -> Map<String, Value> {
        let mut settings: Map<String, Value> = instance
            .descriptor
            .manifest
            .settings
            .iter()
            .map(|def| (def.key.clone(), def.default.clone()))
            .collect();
        settings.extend(self.state.widget_settings(&instance.id));
        settings
    }

    pub fn get_setting(&self, id: &str, key: &str) -> WidgetResult<Value> {
        let instance = self
            .instance(id)
            .ok_or_else(|| WidgetError::UnknownWidget(id.to_string()))?;
        self.effective_settings(&instance)
            .remove(key)
            .ok_or_else(|| WidgetError::InvalidSetting(format!("{id} has no setting \"{key}\"")))
    }

    pub async fn set_setting(&self, id: &str, key: &str, value: Value) -> WidgetResult<()> {
        let _guard = self.locks.acquire(id).await;
        let instance = self
            .instance(id)
            .ok_or_else(|| WidgetError::UnknownWidget(id.to_string()))?;
        let definition = instance
            .descriptor
            .manifest
            .setting(key)
            .ok_or_else(|| WidgetError::InvalidSetting(format!("{id} has no setting \"{key}\"")))?;
        definition.validate(&value)?;

        self.state.set_widget_setting(id, key, value.clone())?;
        self.surfaces.signal(
            id,
            SurfaceSignal::SettingChanged {
                key: key.to_string(),
                value,
            },
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Profiles
    // -----------------------------------------------------------------------

    pub fn save_profile(&self, name: &str) -> WidgetResult<ProfileSnapshot> {
        self.profiles.save_profile(name)
    }

    pub fn get_profile(&self, name: &str) -> WidgetResult<ProfileSnapshot> {
        self.profiles
            .load_profile(name)
            .ok_or_else(|| WidgetError::ProfileNotFound(name.to_string()))
    }

    pub fn list_profiles(&self) -> BTreeMap<String, ProfileSnapshot> {
        self.profiles.list_profiles()
    }

    pub fn delete_profile(&self, name: &str) -> WidgetResult<()> {
        if self.profiles.load_profile(name).is_none() {
            return Err(WidgetError::ProfileNotFound(name.to_string()));
        }
        self.profiles.delete_profile(name)
    }

    pub async fn apply_profile(&self, name: &str) -> WidgetResult<usize> {
        let snapshot = self.get_profile(name)?;
        let applied = self.apply_snapshot(&snapshot).await;
        tracing::info!("Applied profile '{}' to {} widget(s)", name, applied);
        Ok(applied)
    }

    /// Overwrite placement, enablement and opacity from `snapshot`, then bring
    /// surface existence in line. Returns how many loaded widgets were updated.
    pub async fn apply_snapshot(&self, snapshot: &ProfileSnapshot) -> usize {
        let mut applied = 0;
        for (id, record) in snapshot {
            let _guard = self.locks.acquire(id).await;
            match self.instance(id) {
                Some(instance) => match self.apply_record(instance, record) {
                    Ok(()) => applied += 1,
                    Err(e) => tracing::error!("Profile apply failed for '{}': {}", id, e),
                },
                None => {
                    let merged = merge_record(self.state.get(id), record);
                    self.persist("profile state", id, self.state.set(id, merged));
                }
            }
        }
        applied
    }

    fn apply_record(&self, mut instance: WidgetInstance, record: &StateRecord) -> WidgetResult<()> {
        let id = instance.id.clone();
        let state = &mut instance.state;
        state.position = record.position;
        state.enabled = record.enabled;
        state.width = record.width;
        state.height = record.height;
        if let Some(opacity) = record.opacity {
            state.opacity = clamp_opacity(opacity);
        }
        if state.enabled {
            state.hidden = false;
        }
        self.persist("profile state", &id, self.state.set(&id, state.to_record()));

        let has_surface = self.surfaces.contains(&id);
        let result = match (instance.state.enabled, has_surface) {
            (true, false) => {
                let mount = self.mount_context(&instance);
                self.surfaces.create(&instance, mount)
            }
            (false, true) => {
                self.surfaces.destroy(&id, Some(&instance.descriptor));
                Ok(())
            }
            (true, true) => {
                self.surfaces.apply_state(&instance);
                Ok(())
            }
            (false, false) => Ok(()),
        };
        self.update_instance(&id, |current| current.state = instance.state.clone());
        result
    }

    // -----------------------------------------------------------------------
    // Batch visibility
    // -----------------------------------------------------------------------

    fn refresh_hidden_flags(&self) {
        let mut instances = self.instances.lock();
        for (id, instance) in instances.iter_mut() {
            if let Some(record) = self.state.get(id) {
                instance.state.hidden = record.hidden.unwrap_or(false);
            }
        }
    }

    pub async fn hide_all(&self) -> usize {
        let hidden = self.surfaces.hide_all().await;
        self.refresh_hidden_flags();
        hidden
    }

    pub async fn show_all(&self) -> usize {
        let shown = self.surfaces.show_all().await;
        self.refresh_hidden_flags();
        shown
    }

    pub async fn toggle_all(&self) -> BatchAction {
        let action = self.surfaces.toggle_all().await;
        self.refresh_hidden_flags();
        action
    }

    // -----------------------------------------------------------------------
    // Themes
    // -----------------------------------------------------------------------

    pub fn active_theme(&self) -> String {
        self.state.global_settings().active_theme
    }

    fn theme_css(&self) -> String {
        theme_or_default(&self.active_theme()).css()
    }

    pub fn list_themes(&self) -> Vec<ThemeInfo> {
        list_themes(&self.active_theme())
    }

    /// Persist the active theme and restyle every live surface.
    pub fn set_theme(&self, id: &str) -> WidgetResult<()> {
        let theme = find_theme(id)
            .ok_or_else(|| WidgetError::InvalidSetting(format!("unknown theme \"{id}\"")))?;
        let mut global = self.state.global_settings();
        global.active_theme = theme.id.to_string();
        self.state.set_global_settings(global)?;
        self.surfaces
            .broadcast(SurfaceSignal::ThemeChanged { css: theme.css() });
        tracing::info!("Theme set to {}", theme.name);
        Ok(())
    }

    /// Destroy every surface, running each widget's destroy hook.
    pub async fn shutdown(&self) {
        for id in self.ids() {
            let _guard = self.locks.acquire(&id).await;
            self.retire(&id);
        }
        tracing::info!("Widget manager shut down");
    }
}

/// Fold a profile record onto whatever is stored for a widget that is not loaded.
fn merge_record(existing: Option<StateRecord>, record: &StateRecord) -> StateRecord {
    let mut merged = existing.unwrap_or_else(|| record.clone());
    merged.position = record.position;
    merged.enabled = record.enabled;
    merged.width = record.width;
    merged.height = record.height;
    if let Some(opacity) = record.opacity {
        merged.opacity = Some(clamp_opacity(opacity));
    }
    merged
}
