use crate::batch::{BatchAction, BatchTiming};
use crate::snapping::snap_rect;
use nxui_core::{
    clamp_opacity, DesktopLevel, DisplayInfo, InitPayload, LifecycleHook, NativeSurface, Position,
    Rect, StateStore, SurfaceBackend, SurfaceOptions, SurfaceSignal, WidgetDescriptor,
    WidgetInstance, WidgetResult,
};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::sleep;

pub const DEFAULT_SNAP_THRESHOLD: u32 = 20;

/// Extra data delivered with the init payload.
#[derive(Debug, Clone, Default)]
pub struct MountContext {
    pub settings: Map<String, Value>,
    pub theme_css: String,
}

#[derive(Clone)]
struct LiveSurface {
    handle: Arc<dyn NativeSurface>,
    level: DesktopLevel,
}

type SurfaceTable = Arc<Mutex<HashMap<String, LiveSurface>>>;

fn same_surface(a: &Arc<dyn NativeSurface>, b: &Arc<dyn NativeSurface>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// True while `id` still maps to `handle` and the surface has not been destroyed.
fn still_live(table: &SurfaceTable, id: &str, handle: &Arc<dyn NativeSurface>) -> bool {
    let mapped = table
        .lock()
        .get(id)
        .map(|live| same_surface(&live.handle, handle))
        .unwrap_or(false);
    mapped && !handle.is_destroyed()
}

fn run_hook(id: &str, name: &str, hook: Option<&Arc<dyn LifecycleHook>>, args: Vec<Value>) {
    if let Some(hook) = hook {
        if let Err(e) = hook.invoke(args) {
            tracing::warn!("{} hook of '{}' failed: {}", name, id, e);
        }
    }
}

/// Owns the identifier → surface table and every geometry/visibility transition.
pub struct SurfaceController {
    backend: Arc<dyn SurfaceBackend>,
    store: Arc<dyn StateStore>,
    display: Arc<dyn DisplayInfo>,
    surfaces: SurfaceTable,
    snap_threshold: u32,
    timing: BatchTiming,
}

impl SurfaceController {
    pub fn new(
        backend: Arc<dyn SurfaceBackend>,
        store: Arc<dyn StateStore>,
        display: Arc<dyn DisplayInfo>,
    ) -> Self {
        Self {
            backend,
            store,
            display,
            surfaces: Arc::new(Mutex::new(HashMap::new())),
            snap_threshold: DEFAULT_SNAP_THRESHOLD,
            timing: BatchTiming::default(),
        }
    }

    pub fn with_snap_threshold(mut self, threshold: u32) -> Self {
        self.snap_threshold = threshold;
        self
    }

    pub fn with_timing(mut self, timing: BatchTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.surfaces.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.surfaces.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.lock().is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.surfaces.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn handle(&self, id: &str) -> Option<Arc<dyn NativeSurface>> {
        self.surfaces
            .lock()
            .get(id)
            .map(|live| Arc::clone(&live.handle))
            .filter(|handle| !handle.is_destroyed())
    }

    /// Create and show the surface for an enabled instance.
    pub fn create(&self, instance: &WidgetInstance, mount: MountContext) -> WidgetResult<()> {
        let manifest = &instance.descriptor.manifest;
        let state = &instance.state;

        if let Some(stale) = self.surfaces.lock().remove(&instance.id) {
            tracing::warn!("Replacing live surface for '{}'", instance.id);
            stale.handle.close();
        }

        let ignore_input = manifest.click_through || !state.draggable;
        let level = manifest.desktop_level;
        let options = SurfaceOptions {
            id: instance.id.clone(),
            title: manifest.name.clone(),
            bounds: state.bounds(manifest),
            transparent: manifest.transparent,
            frameless: true,
            always_on_top: manifest.always_on_top && level == DesktopLevel::Top,
            level,
            resizable: manifest.resizable,
            focusable: level != DesktopLevel::Bottom,
            opacity: state.opacity,
            ignore_input,
        };
        let handle = self.backend.create_surface(&options)?;
        if ignore_input {
            handle.set_ignore_input(true);
        }

        let html = instance.descriptor.render_markup().unwrap_or_else(|e| {
            tracing::warn!("Render of '{}' failed: {}", instance.id, e);
            String::new()
        });
        handle.send(SurfaceSignal::Init(InitPayload {
            id: instance.id.clone(),
            name: manifest.name.clone(),
            html,
            styles: manifest.styles.clone().unwrap_or_default(),
            click_through: ignore_input,
            settings: mount.settings.clone(),
            theme_css: mount.theme_css,
        }));

        if !state.hidden {
            match level {
                DesktopLevel::Bottom => handle.show_inactive(),
                _ => handle.show(),
            }
        }

        self.surfaces.lock().insert(
            instance.id.clone(),
            LiveSurface {
                handle: Arc::clone(&handle),
                level,
            },
        );

        let bounds = handle.bounds();
        run_hook(
            &instance.id,
            "onMount",
            instance.descriptor.hooks.on_mount.as_ref(),
            vec![json!({
                "id": instance.id,
                "width": bounds.width,
                "height": bounds.height,
                "settings": Value::Object(mount.settings),
            })],
        );
        tracing::info!("Created surface for '{}'", instance.id);
        Ok(())
    }

    /// Close and forget the surface for `id`. Returns whether one existed.
    pub fn destroy(&self, id: &str, descriptor: Option<&WidgetDescriptor>) -> bool {
        let Some(live) = self.surfaces.lock().remove(id) else {
            return false;
        };
        if let Some(descriptor) = descriptor {
            run_hook(id, "onDestroy", descriptor.hooks.on_destroy.as_ref(), Vec::new());
        }
        if !live.handle.is_destroyed() {
            live.handle.close();
        }
        tracing::info!("Destroyed surface for '{}'", id);
        true
    }

    /// Clamp, apply to the live surface if any, and persist regardless.
    pub fn set_opacity(&self, id: &str, requested: f64) -> f64 {
        let opacity = clamp_opacity(requested);
        if let Some(handle) = self.handle(id) {
            handle.set_opacity(opacity);
        }
        if let Err(e) = self.store.set_opacity(id, opacity) {
            tracing::error!("Failed to persist opacity for '{}': {}", id, e);
        }
        opacity
    }

    /// Flip input pass-through without recreating the surface.
    pub fn set_draggable(&self, id: &str, draggable: bool, click_through: bool) {
        if let Some(handle) = self.handle(id) {
            handle.set_ignore_input(click_through || !draggable);
            handle.send(SurfaceSignal::DragModeChanged { draggable });
        }
        if let Err(e) = self.store.set_draggable(id, draggable) {
            tracing::error!("Failed to persist drag mode for '{}': {}", id, e);
        }
    }

    /// Push a changed runtime state onto an existing surface in place.
    pub fn apply_state(&self, instance: &WidgetInstance) {
        let Some(handle) = self.handle(&instance.id) else {
            return;
        };
        let manifest = &instance.descriptor.manifest;
        handle.set_bounds(instance.state.bounds(manifest));
        handle.set_opacity(instance.state.opacity);
        handle.set_ignore_input(manifest.click_through || !instance.state.draggable);
    }

    pub fn record_move(&self, id: &str, position: Position) {
        if let Err(e) = self.store.set_position(id, position) {
            tracing::error!("Failed to persist position for '{}': {}", id, e);
        }
    }

    pub fn record_resize(&self, id: &str, width: u32, height: u32, descriptor: &WidgetDescriptor) {
        if let Err(e) = self.store.set_size(id, width, height) {
            tracing::error!("Failed to persist size for '{}': {}", id, e);
        }
        run_hook(
            id,
            "onResize",
            descriptor.hooks.on_resize.as_ref(),
            vec![json!(width), json!(height)],
        );
    }

    /// Snap a surface after a drag. Returns the new position if it moved.
    pub fn snap(&self, id: &str) -> Option<Position> {
        let (handle, others) = {
            let table = self.surfaces.lock();
            let handle = Arc::clone(&table.get(id)?.handle);
            let others: Vec<Rect> = table
                .iter()
                .filter(|(other, live)| other.as_str() != id && !live.handle.is_destroyed())
                .map(|(_, live)| live.handle.bounds())
                .collect();
            (handle, others)
        };
        if handle.is_destroyed() {
            return None;
        }

        let bounds = handle.bounds();
        let snapped = snap_rect(
            bounds,
            self.display.primary_work_area(),
            &others,
            self.snap_threshold,
        );
        if snapped == bounds.position() {
            return None;
        }

        handle.set_bounds(Rect::new(snapped.x, snapped.y, bounds.width, bounds.height));
        self.record_move(id, snapped);
        tracing::debug!("Snapped '{}' to ({}, {})", id, snapped.x, snapped.y);
        Some(snapped)
    }

    pub fn signal(&self, id: &str, signal: SurfaceSignal) {
        if let Some(handle) = self.handle(id) {
            handle.send(signal);
        }
    }

    pub fn broadcast(&self, signal: SurfaceSignal) {
        let handles: Vec<_> = self
            .surfaces
            .lock()
            .values()
            .map(|live| Arc::clone(&live.handle))
            .collect();
        for handle in handles.into_iter().filter(|h| !h.is_destroyed()) {
            handle.send(signal.clone());
        }
    }

    fn batch_targets(&self) -> Vec<(String, LiveSurface)> {
        let mut targets: Vec<(String, LiveSurface)> = self
            .surfaces
            .lock()
            .iter()
            .map(|(id, live)| (id.clone(), live.clone()))
            .collect();
        targets.sort_by(|a, b| a.0.cmp(&b.0));
        targets
    }

    /// Hide every surface, staggered. Returns how many were actually hidden.
    pub async fn hide_all(&self) -> usize {
        let mut tasks = JoinSet::new();
        for (index, (id, live)) in self.batch_targets().into_iter().enumerate() {
            let delay = self.timing.step * index as u32;
            let settle = self.timing.settle;
            let table = Arc::clone(&self.surfaces);
            let store = Arc::clone(&self.store);
            tasks.spawn(async move {
                sleep(delay).await;
                if !still_live(&table, &id, &live.handle) {
                    return false;
                }
                live.handle.send(SurfaceSignal::BeginHide);
                sleep(settle).await;
                if !still_live(&table, &id, &live.handle) {
                    return false;
                }
                live.handle.hide();
                if let Err(e) = store.set_hidden(&id, true) {
                    tracing::error!("Failed to persist hidden flag for '{}': {}", id, e);
                }
                true
            });
        }
        Self::count_done(tasks).await
    }

    /// Show every surface, staggered. Returns how many were actually shown.
    pub async fn show_all(&self) -> usize {
        let mut tasks = JoinSet::new();
        for (index, (id, live)) in self.batch_targets().into_iter().enumerate() {
            let delay = self.timing.step * index as u32;
            let table = Arc::clone(&self.surfaces);
            let store = Arc::clone(&self.store);
            tasks.spawn(async move {
                sleep(delay).await;
                if !still_live(&table, &id, &live.handle) {
                    return false;
                }
                match live.level {
                    DesktopLevel::Bottom => live.handle.show_inactive(),
                    _ => live.handle.show(),
                }
                live.handle.send(SurfaceSignal::BeginShow);
                if let Err(e) = store.set_hidden(&id, false) {
                    tracing::error!("Failed to persist hidden flag for '{}': {}", id, e);
                }
                true
            });
        }
        Self::count_done(tasks).await
    }

    /// Hide everything if anything is visible, otherwise show everything.
    pub async fn toggle_all(&self) -> BatchAction {
        let any_visible = self
            .batch_targets()
            .iter()
            .any(|(_, live)| live.handle.is_visible());
        if any_visible {
            BatchAction::Hidden(self.hide_all().await)
        } else {
            BatchAction::Shown(self.show_all().await)
        }
    }

    async fn count_done(mut tasks: JoinSet<bool>) -> usize {
        let mut done = 0;
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(true) => done += 1,
                Ok(false) => {}
                Err(e) => tracing::error!("Batch surface task failed: {}", e),
            }
        }
        done
    }
}
