use nxui_core::{DisplayInfo, Position, Rect, StateStore, WidgetManifest, WidgetRuntimeState};
use std::sync::Arc;

/// Merges a freshly loaded descriptor with persisted per-widget state.
#[derive(Clone)]
pub struct StateReconciler {
    store: Arc<dyn StateStore>,
    display: Arc<dyn DisplayInfo>,
}

impl StateReconciler {
    pub fn new(store: Arc<dyn StateStore>, display: Arc<dyn DisplayInfo>) -> Self {
        Self { store, display }
    }

    /// Runtime state to use for `id` after a load or reload.
    ///
    /// First-ever loads get a centered default that is persisted immediately.
    /// Records written before `draggable`/`opacity` existed are backfilled and
    /// re-persisted. Anything else is returned untouched.
    pub fn reconcile(&self, id: &str, manifest: &WidgetManifest) -> WidgetRuntimeState {
        let Some(record) = self.store.get(id) else {
            let position = default_position(
                self.display.primary_work_area(),
                manifest.width,
                manifest.height,
            );
            let state = WidgetRuntimeState::with_defaults(position);
            tracing::info!(
                "First load of '{}', placing at ({}, {})",
                id,
                position.x,
                position.y
            );
            if let Err(e) = self.store.set(id, state.to_record()) {
                tracing::error!("Failed to persist initial state for '{}': {}", id, e);
            }
            return state;
        };

        if record.needs_backfill() {
            let mut patched = record.clone();
            patched.draggable.get_or_insert(true);
            patched.opacity.get_or_insert(1.0);
            tracing::debug!("Backfilling legacy state record for '{}'", id);
            if let Err(e) = self.store.set(id, patched) {
                tracing::error!("Failed to persist backfilled state for '{}': {}", id, e);
            }
        }

        record.resolve()
    }
}

/// Top-left corner that centers a `width`×`height` widget in the work area.
pub fn default_position(work_area: Rect, width: u32, height: u32) -> Position {
    let center = |origin: i32, span: u32, size: u32| -> i32 {
        let offset = span as f64 / 2.0 - size as f64 / 2.0;
        // Half-way values round up.
        origin.saturating_add((offset + 0.5).floor() as i32)
    };
    Position::new(
        center(work_area.x, work_area.width, width),
        center(work_area.y, work_area.height, height),
    )
}
