//! In-memory presentation backend.
//!
//! Used when no compositor integration is available: every surface call is
//! logged and tracked so the runtime can be driven and inspected end to end.

use nxui_core::{
    DisplayInfo, NativeSurface, Rect, SurfaceBackend, SurfaceOptions, SurfaceSignal, WidgetError,
    WidgetResult,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub struct HeadlessSurface {
    options: SurfaceOptions,
    bounds: Mutex<Rect>,
    opacity: Mutex<f64>,
    ignore_input: AtomicBool,
    visible: AtomicBool,
    destroyed: AtomicBool,
    signals: Mutex<Vec<SurfaceSignal>>,
    journal: Mutex<Vec<(&'static str, Instant)>>,
}

impl HeadlessSurface {
    fn new(options: SurfaceOptions) -> Self {
        Self {
            bounds: Mutex::new(options.bounds),
            opacity: Mutex::new(options.opacity),
            ignore_input: AtomicBool::new(options.ignore_input),
            visible: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            signals: Mutex::new(Vec::new()),
            journal: Mutex::new(Vec::new()),
            options,
        }
    }

    fn note(&self, op: &'static str) {
        tracing::trace!(surface = %self.options.id, "{}", op);
        self.journal.lock().push((op, Instant::now()));
    }

    pub fn id(&self) -> &str {
        &self.options.id
    }

    pub fn options(&self) -> &SurfaceOptions {
        &self.options
    }

    pub fn opacity(&self) -> f64 {
        *self.opacity.lock()
    }

    pub fn ignores_input(&self) -> bool {
        self.ignore_input.load(Ordering::SeqCst)
    }

    pub fn signals(&self) -> Vec<SurfaceSignal> {
        self.signals.lock().clone()
    }

    /// Names of every call made on this surface, in order.
    pub fn journal(&self) -> Vec<&'static str> {
        self.journal.lock().iter().map(|(op, _)| *op).collect()
    }

    pub fn first_call(&self, op: &str) -> Option<Instant> {
        self.journal
            .lock()
            .iter()
            .find(|(name, _)| *name == op)
            .map(|(_, at)| *at)
    }
}

impl NativeSurface for HeadlessSurface {
    fn send(&self, signal: SurfaceSignal) {
        let op = match &signal {
            SurfaceSignal::Init(_) => "init",
            SurfaceSignal::BeginHide => "begin-hide",
            SurfaceSignal::BeginShow => "begin-show",
            SurfaceSignal::DragModeChanged { .. } => "drag-mode",
            SurfaceSignal::SettingChanged { .. } => "setting",
            SurfaceSignal::ThemeChanged { .. } => "theme",
        };
        self.note(op);
        self.signals.lock().push(signal);
    }

    fn bounds(&self) -> Rect {
        *self.bounds.lock()
    }

    fn set_bounds(&self, bounds: Rect) {
        self.note("set-bounds");
        *self.bounds.lock() = bounds;
    }

    fn set_opacity(&self, opacity: f64) {
        self.note("set-opacity");
        *self.opacity.lock() = opacity;
    }

    fn set_ignore_input(&self, ignore: bool) {
        self.note("ignore-input");
        self.ignore_input.store(ignore, Ordering::SeqCst);
    }

    fn show(&self) {
        self.note("show");
        self.visible.store(true, Ordering::SeqCst);
    }

    fn show_inactive(&self) {
        self.note("show-inactive");
        self.visible.store(true, Ordering::SeqCst);
    }

    fn hide(&self) {
        self.note("hide");
        self.visible.store(false, Ordering::SeqCst);
    }

    fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst) && !self.is_destroyed()
    }

    fn close(&self) {
        self.note("close");
        self.visible.store(false, Ordering::SeqCst);
        self.destroyed.store(true, Ordering::SeqCst);
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

/// Backend that keeps every created surface in memory.
#[derive(Default)]
pub struct HeadlessBackend {
    created: Mutex<Vec<Arc<HeadlessSurface>>>,
    failures: AtomicUsize,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` creations fail.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn created(&self) -> Vec<Arc<HeadlessSurface>> {
        self.created.lock().clone()
    }

    /// Surfaces for `id` that have not been closed.
    pub fn live(&self, id: &str) -> Vec<Arc<HeadlessSurface>> {
        self.created
            .lock()
            .iter()
            .filter(|surface| surface.id() == id && !surface.is_destroyed())
            .cloned()
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.created
            .lock()
            .iter()
            .filter(|surface| !surface.is_destroyed())
            .count()
    }
}

impl SurfaceBackend for HeadlessBackend {
    fn create_surface(&self, options: &SurfaceOptions) -> WidgetResult<Arc<dyn NativeSurface>> {
        let pending = self.failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures.store(pending - 1, Ordering::SeqCst);
            return Err(WidgetError::Surface(format!(
                "presentation layer refused surface for '{}'",
                options.id
            )));
        }

        tracing::info!(
            "Surface '{}' at ({}, {}) {}x{} level={} opacity={:.2}",
            options.id,
            options.bounds.x,
            options.bounds.y,
            options.bounds.width,
            options.bounds.height,
            options.level.as_str(),
            options.opacity
        );
        let surface = Arc::new(HeadlessSurface::new(options.clone()));
        self.created.lock().push(Arc::clone(&surface));
        Ok(surface)
    }
}

/// Display with a fixed work area.
#[derive(Debug, Clone, Copy)]
pub struct StaticDisplay(pub Rect);

impl DisplayInfo for StaticDisplay {
    fn primary_work_area(&self) -> Rect {
        self.0
    }
}
