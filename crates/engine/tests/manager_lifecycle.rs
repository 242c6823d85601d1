#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Widget manager lifecycle against real scripts, a JSON settings file and
//! the in-memory surface backend.

use async_trait::async_trait;
use nxui_core::{
    NativeSurface, Position, Rect, StateStore, SurfaceEvent, SurfaceSignal, WidgetDescriptor,
    WidgetError, WidgetLoader, WidgetResult,
};
use nxui_engine::WidgetManager;
use nxui_runtime::ScriptLoader;
use nxui_store::{SettingsStore, SETTINGS_FILE};
use nxui_surfaces::{BatchTiming, HeadlessBackend, StaticDisplay};
use nxui_watcher::{WatchEvent, WatchEventKind};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    temp: TempDir,
    backend: Arc<HeadlessBackend>,
    store: Arc<SettingsStore>,
    manager: WidgetManager,
}

impl Harness {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("widgets")).unwrap();
        let backend = Arc::new(HeadlessBackend::new());
        let store = Arc::new(SettingsStore::open(temp.path().join(SETTINGS_FILE)));
        let manager = Self::build(temp.path(), backend.clone(), store.clone());
        Self {
            temp,
            backend,
            store,
            manager,
        }
    }

    fn build(
        root: &Path,
        backend: Arc<HeadlessBackend>,
        store: Arc<SettingsStore>,
    ) -> WidgetManager {
        WidgetManager::new(
            root.join("widgets"),
            Arc::new(ScriptLoader::default()),
            store,
            backend,
            Arc::new(StaticDisplay(Rect::new(0, 0, 1920, 1080))),
        )
        .with_batch_timing(BatchTiming {
            step: Duration::from_millis(5),
            settle: Duration::from_millis(10),
        })
    }

    fn root(&self) -> PathBuf {
        self.temp.path().join("widgets")
    }

    fn write_single(&self, id: &str, script: &str) -> PathBuf {
        let path = self.root().join(format!("{id}.widget.rhai"));
        fs::write(&path, script).unwrap();
        path
    }

    fn write_folder(&self, id: &str, script: &str) -> PathBuf {
        let dir = self.root().join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("widget.rhai"), script).unwrap();
        dir
    }

    fn live_surfaces(&self, id: &str) -> usize {
        self.backend.live(id).len()
    }

    /// A surface exists for every enabled instance and for nothing else.
    fn assert_surface_invariant(&self) {
        for id in self.manager.ids() {
            let enabled = self.manager.instance(&id).unwrap().state.enabled;
            assert_eq!(self.live_surfaces(&id), usize::from(enabled), "surface count for {id}");
        }
        assert_eq!(self.backend.live_count(), self.manager.surfaces().len());
    }
}

fn widget(name: &str, width: u32, height: u32) -> String {
    format!(
        r#"
        import "nxui/sdk" as sdk;

        sdk::define_widget(#{{
            name: "{name}",
            version: "1.0.0",
            author: "NxUI",
            width: {width},
            height: {height},
            settings: [
                #{{ key: "format", label: "Format", type: "select", "default": "24h", options: ["12h", "24h"] }},
                #{{ key: "size", label: "Size", type: "number", "default": 14, min: 8, max: 48 }},
            ],
            render: || "<div class='{name}'></div>",
        }})
        "#
    )
}

#[tokio::test]
async fn test_scan_survives_one_broken_widget() {
    let h = Harness::new();
    h.write_folder("clock", &widget("Clock", 300, 150));
    h.write_single("notes", &widget("Notes", 320, 400));
    h.write_single("broken", "sdk::define_widget(#{ name: ");

    let report = h.manager.initialize().await;

    assert_eq!(report.loaded, vec!["clock".to_string(), "notes".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "broken");
    assert_eq!(h.manager.ids(), vec!["clock".to_string(), "notes".to_string()]);
    assert!(h.manager.instance("broken").is_none());
    h.assert_surface_invariant();
}

#[tokio::test]
async fn test_first_load_centers_widget() {
    let h = Harness::new();
    h.write_single("clock", &widget("Clock", 300, 150));
    h.manager.initialize().await;

    let instance = h.manager.instance("clock").unwrap();
    assert_eq!(instance.state.position, Position::new(810, 465));
    let surface = h.backend.live("clock").pop().unwrap();
    assert_eq!(surface.bounds(), Rect::new(810, 465, 300, 150));
    assert!(surface.is_visible());
}

#[tokio::test]
async fn test_missing_height_fails_validation_without_instance() {
    let h = Harness::new();
    let path = h.write_single(
        "flat",
        r#"
        import "nxui/sdk" as sdk;
        sdk::define_widget(#{ name: "Flat", version: "1.0.0", author: "NxUI", width: 200 })
        "#,
    );

    let report = h.manager.initialize().await;
    assert!(report.loaded.is_empty());
    let message = &report.failed[0].1;
    assert!(message.contains("height"), "{message}");
    assert!(message.contains(&path.display().to_string()), "{message}");
    assert!(h.manager.instance("flat").is_none());
    assert_eq!(h.backend.live_count(), 0);

    let err = h.manager.reload_widget("flat").await.unwrap_err();
    match err {
        WidgetError::Validation { field, path: reported, .. } => {
            assert_eq!(field, "height");
            assert_eq!(reported, path);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_reload_is_idempotent() {
    let h = Harness::new();
    h.write_folder("clock", &widget("Clock", 300, 150));
    h.manager.initialize().await;
    h.manager
        .handle_surface_event("clock", SurfaceEvent::Moved(Position::new(40, 60)))
        .await;
    h.manager.set_opacity("clock", 0.6).await;

    h.manager.reload_widget("clock").await.unwrap();
    let first = h.manager.instance("clock").unwrap();
    let persisted_before = fs::read(h.store.path()).unwrap();

    h.manager.reload_widget("clock").await.unwrap();
    let second = h.manager.instance("clock").unwrap();
    let persisted_after = fs::read(h.store.path()).unwrap();

    assert_eq!(first.descriptor.manifest, second.descriptor.manifest);
    assert_eq!(first.state, second.state);
    assert_eq!(second.state.position, Position::new(40, 60));
    assert_eq!(second.state.opacity, 0.6);
    assert_eq!(persisted_before, persisted_after);
    assert_eq!(h.live_surfaces("clock"), 1);
}

#[tokio::test]
async fn test_reload_picks_up_new_companions() {
    let h = Harness::new();
    let dir = h.write_folder("clock", &widget("Clock", 300, 150));
    h.manager.initialize().await;

    fs::write(dir.join("template.html"), "<p>from template</p>").unwrap();
    fs::write(dir.join("styles.css"), "p { color: teal; }").unwrap();
    h.manager.reload_widget("clock").await.unwrap();

    let surface = h.backend.live("clock").pop().unwrap();
    match &surface.signals()[0] {
        SurfaceSignal::Init(payload) => {
            assert_eq!(payload.html, "<p>from template</p>");
            assert!(payload.styles.ends_with("p { color: teal; }"));
            assert_eq!(payload.settings["format"], json!("24h"));
            assert!(payload.theme_css.starts_with(":root {"));
        }
        other => panic!("expected init, got {other:?}"),
    }
}

#[tokio::test]
async fn test_remove_then_add_restores_state() {
    let h = Harness::new();
    let path = h.write_single("clock", &widget("Clock", 300, 150));
    h.manager.initialize().await;
    h.manager
        .handle_surface_event("clock", SurfaceEvent::Moved(Position::new(12, 34)))
        .await;
    h.manager.set_opacity("clock", 0.3).await;
    h.manager.set_setting("clock", "format", json!("12h")).await.unwrap();

    h.manager
        .handle_watch_event(WatchEvent {
            kind: WatchEventKind::Removed,
            id: "clock".into(),
            path: path.clone(),
        })
        .await;
    assert!(h.manager.instance("clock").is_none());
    assert_eq!(h.backend.live_count(), 0);
    assert!(h.store.get("clock").is_some());

    h.manager
        .handle_watch_event(WatchEvent {
            kind: WatchEventKind::Added,
            id: "clock".into(),
            path,
        })
        .await;
    let instance = h.manager.instance("clock").unwrap();
    assert_eq!(instance.state.position, Position::new(12, 34));
    assert_eq!(instance.state.opacity, 0.3);
    assert_eq!(h.manager.get_setting("clock", "format").unwrap(), json!("12h"));
}

#[tokio::test]
async fn test_at_most_one_surface_through_transitions() {
    let h = Harness::new();
    h.write_single("clock", &widget("Clock", 300, 150));
    h.write_single("notes", &widget("Notes", 320, 400));
    h.manager.initialize().await;
    h.assert_surface_invariant();

    assert!(h.manager.toggle_widget("clock", false).await.unwrap());
    h.assert_surface_invariant();
    assert!(!h.manager.toggle_widget("clock", false).await.unwrap());
    h.manager.reload_widget("clock").await.unwrap();
    h.assert_surface_invariant();
    assert_eq!(h.live_surfaces("clock"), 0);

    assert!(h.manager.toggle_widget("clock", true).await.unwrap());
    h.manager.reload_widget("clock").await.unwrap();
    h.manager.reload_widget("notes").await.unwrap();
    h.manager
        .handle_watch_event(WatchEvent {
            kind: WatchEventKind::Added,
            id: "notes".into(),
            path: h.root().join("notes.widget.rhai"),
        })
        .await;
    h.assert_surface_invariant();
    assert_eq!(h.live_surfaces("clock"), 1);
    assert_eq!(h.live_surfaces("notes"), 1);

    assert!(!h.manager.toggle_widget("ghost", true).await.unwrap());
    h.assert_surface_invariant();
}

#[tokio::test]
async fn test_concurrent_reloads_keep_one_surface() {
    let h = Harness::new();
    h.write_single("clock", &widget("Clock", 300, 150));
    h.manager.initialize().await;

    let manager = &h.manager;
    let (a, b, c) = tokio::join!(
        manager.reload_widget("clock"),
        manager.toggle_widget("clock", false),
        manager.reload_widget("clock"),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();
    h.assert_surface_invariant();
}

#[tokio::test]
async fn test_drag_toggle_and_opacity_without_recreate() {
    let h = Harness::new();
    h.write_single("clock", &widget("Clock", 300, 150));
    h.manager.initialize().await;
    let created = h.backend.created().len();

    assert_eq!(h.manager.toggle_drag("clock").await, Some(false));
    let surface = h.backend.live("clock").pop().unwrap();
    assert!(surface.ignores_input());
    assert_eq!(h.store.get("clock").unwrap().draggable, Some(false));

    assert_eq!(h.manager.set_opacity("clock", 0.0).await, 0.1);
    assert_eq!(h.manager.set_opacity("clock", 5.0).await, 1.0);
    assert_eq!(h.manager.set_opacity("clock", 0.5).await, 0.5);
    assert_eq!(surface.opacity(), 0.5);
    assert_eq!(h.backend.created().len(), created);
    assert_eq!(h.manager.toggle_drag("ghost").await, None);
}

/// Delays every load once switched on, keeping a reload in flight.
struct SlowLoader {
    inner: ScriptLoader,
    slow: AtomicBool,
}

#[async_trait]
impl WidgetLoader for SlowLoader {
    async fn load(
        &self,
        entry_path: &Path,
        companion_dir: Option<&Path>,
    ) -> WidgetResult<WidgetDescriptor> {
        if self.slow.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        self.inner.load(entry_path, companion_dir).await
    }
}

#[tokio::test]
async fn test_drag_toggle_waits_for_inflight_reload() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("widgets");
    fs::create_dir(&root).unwrap();
    fs::write(root.join("clock.widget.rhai"), widget("Clock", 300, 150)).unwrap();

    let loader = Arc::new(SlowLoader {
        inner: ScriptLoader::default(),
        slow: AtomicBool::new(false),
    });
    let backend = Arc::new(HeadlessBackend::new());
    let store = Arc::new(SettingsStore::open(temp.path().join(SETTINGS_FILE)));
    let manager = Arc::new(WidgetManager::new(
        root,
        loader.clone(),
        store.clone(),
        backend.clone(),
        Arc::new(StaticDisplay(Rect::new(0, 0, 1920, 1080))),
    ));
    manager.initialize().await;
    loader.slow.store(true, Ordering::SeqCst);

    let reload = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.reload_widget("clock").await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(manager.toggle_drag("clock").await, Some(false));
    reload.await.unwrap().unwrap();

    assert!(!manager.instance("clock").unwrap().state.draggable);
    assert_eq!(store.get("clock").unwrap().draggable, Some(false));
    assert!(backend.live("clock").pop().unwrap().ignores_input());

    // Two toggles in a row see each other's result.
    assert_eq!(manager.toggle_drag("clock").await, Some(true));
    assert_eq!(manager.toggle_drag("clock").await, Some(false));
}

#[tokio::test]
async fn test_opacity_persists_while_disabled() {
    let h = Harness::new();
    h.write_single("clock", &widget("Clock", 300, 150));
    h.manager.initialize().await;
    h.manager.toggle_widget("clock", false).await.unwrap();

    assert_eq!(h.manager.set_opacity("clock", 0.0).await, 0.1);
    assert_eq!(h.store.get("clock").unwrap().opacity, Some(0.1));

    h.manager.toggle_widget("clock", true).await.unwrap();
    assert_eq!(h.backend.live("clock")[0].opacity(), 0.1);
}

#[tokio::test]
async fn test_profile_apply_reconciles_surfaces() {
    let h = Harness::new();
    h.write_single("clock", &widget("Clock", 300, 150));
    h.write_single("notes", &widget("Notes", 320, 400));
    h.manager.initialize().await;

    h.manager
        .handle_surface_event("clock", SurfaceEvent::Moved(Position::new(100, 100)))
        .await;
    h.manager.toggle_widget("notes", false).await.unwrap();
    h.manager.save_profile("work").unwrap();

    h.manager
        .handle_surface_event("clock", SurfaceEvent::Moved(Position::new(900, 900)))
        .await;
    h.manager.toggle_widget("notes", true).await.unwrap();
    h.manager.set_opacity("clock", 0.2).await;

    let applied = h.manager.apply_profile("work").await.unwrap();
    assert_eq!(applied, 2);

    let clock = h.manager.instance("clock").unwrap();
    assert_eq!(clock.state.position, Position::new(100, 100));
    assert_eq!(clock.state.opacity, 1.0);
    assert_eq!(h.backend.live("clock")[0].bounds().position(), Position::new(100, 100));
    assert!(!h.manager.instance("notes").unwrap().state.enabled);
    h.assert_surface_invariant();
    assert_eq!(h.store.get("clock").unwrap().position, Position::new(100, 100));

    assert!(matches!(
        h.manager.apply_profile("missing").await,
        Err(WidgetError::ProfileNotFound(_))
    ));
}

#[tokio::test]
async fn test_settings_are_validated_and_signalled() {
    let h = Harness::new();
    h.write_single("clock", &widget("Clock", 300, 150));
    h.manager.initialize().await;

    assert_eq!(h.manager.get_setting("clock", "size").unwrap(), json!(14));
    h.manager.set_setting("clock", "size", json!(20)).await.unwrap();
    assert_eq!(h.manager.get_setting("clock", "size").unwrap(), json!(20));

    assert!(matches!(
        h.manager.set_setting("clock", "size", json!(100)).await,
        Err(WidgetError::InvalidSetting(_))
    ));
    assert!(h.manager.set_setting("clock", "colour", json!("red")).await.is_err());
    assert!(matches!(
        h.manager.get_setting("ghost", "size"),
        Err(WidgetError::UnknownWidget(_))
    ));

    let signals = h.backend.live("clock")[0].signals();
    assert!(signals.iter().any(|s| matches!(
        s,
        SurfaceSignal::SettingChanged { key, value } if key == "size" && *value == json!(20)
    )));
}

#[tokio::test]
async fn test_batch_hide_and_show() {
    let h = Harness::new();
    h.write_single("clock", &widget("Clock", 300, 150));
    h.write_single("notes", &widget("Notes", 320, 400));
    h.manager.initialize().await;

    assert_eq!(h.manager.hide_all().await, 2);
    assert!(h.manager.instance("clock").unwrap().state.hidden);
    assert!(h.backend.live("notes").iter().all(|s| !s.is_visible()));

    assert_eq!(h.manager.show_all().await, 2);
    assert!(!h.manager.instance("clock").unwrap().state.hidden);
    assert!(h.backend.live("clock")[0].is_visible());
}

#[tokio::test]
async fn test_hidden_widget_reloads_hidden() {
    let h = Harness::new();
    h.write_single("clock", &widget("Clock", 300, 150));
    h.manager.initialize().await;
    h.manager.hide_all().await;

    h.manager.reload_widget("clock").await.unwrap();
    let surface = h.backend.live("clock").pop().unwrap();
    assert!(!surface.is_visible());

    h.manager.toggle_widget("clock", false).await.unwrap();
    h.manager.toggle_widget("clock", true).await.unwrap();
    assert!(h.backend.live("clock")[0].is_visible());
}

#[tokio::test]
async fn test_surface_feedback_persists_geometry() {
    let h = Harness::new();
    h.write_single("clock", &widget("Clock", 300, 150));
    h.write_single("notes", &widget("Notes", 320, 400));
    h.manager.initialize().await;

    h.manager
        .handle_surface_event("clock", SurfaceEvent::Resized { width: 360, height: 180 })
        .await;
    assert_eq!(h.store.get("clock").unwrap().width, Some(360));

    // Park clock just right of notes and let it snap.
    let notes = h.backend.live("notes")[0].bounds();
    let clock = h.backend.live("clock").pop().unwrap();
    clock.set_bounds(Rect::new(notes.right() + 9, notes.y + 5, 360, 180));
    h.manager.handle_surface_event("clock", SurfaceEvent::DragEnded).await;
    let snapped = h.manager.instance("clock").unwrap().state.position;
    assert_eq!(snapped, Position::new(notes.right(), notes.y));
    assert_eq!(h.store.get("clock").unwrap().position, snapped);

    h.manager.handle_surface_event("clock", SurfaceEvent::Closed).await;
    assert!(!h.manager.instance("clock").unwrap().state.enabled);
    h.assert_surface_invariant();
}

#[tokio::test]
async fn test_theme_change_restyles_live_surfaces() {
    let h = Harness::new();
    h.write_single("clock", &widget("Clock", 300, 150));
    h.manager.initialize().await;

    h.manager.set_theme("midnight").unwrap();
    assert_eq!(h.manager.active_theme(), "midnight");
    assert!(h.manager.set_theme("vaporwave").is_err());

    let surface = h.backend.live("clock").pop().unwrap();
    assert!(surface.signals().iter().any(|s| matches!(
        s,
        SurfaceSignal::ThemeChanged { css } if css.contains("#00d4ff")
    )));

    let reopened = SettingsStore::open(h.store.path());
    assert_eq!(reopened.global_settings().active_theme, "midnight");
}

#[tokio::test]
async fn test_uninstall_forgets_state_but_remove_does_not() {
    let h = Harness::new();
    h.write_single("clock", &widget("Clock", 300, 150));
    h.write_single("notes", &widget("Notes", 320, 400));
    h.manager.initialize().await;
    h.manager.set_setting("notes", "size", json!(30)).await.unwrap();

    assert!(h.manager.remove_widget("clock").await);
    assert!(h.store.get("clock").is_some());

    assert!(h.manager.uninstall_widget("notes").await);
    assert!(h.store.get("notes").is_none());
    assert!(h.store.widget_settings("notes").is_empty());
    assert_eq!(h.backend.live_count(), 0);
}

#[tokio::test]
async fn test_shutdown_destroys_every_surface() {
    let h = Harness::new();
    h.write_single("clock", &widget("Clock", 300, 150));
    h.write_folder("notes", &widget("Notes", 320, 400));
    h.manager.initialize().await;

    h.manager.shutdown().await;
    assert_eq!(h.backend.live_count(), 0);
    assert!(h.manager.ids().is_empty());
    assert!(h.store.get("clock").is_some());
}

#[tokio::test]
async fn test_state_survives_restart() {
    let h = Harness::new();
    h.write_single("clock", &widget("Clock", 300, 150));
    h.manager.initialize().await;
    h.manager
        .handle_surface_event("clock", SurfaceEvent::Moved(Position::new(7, 8)))
        .await;
    h.manager.toggle_widget("clock", false).await.unwrap();

    let backend = Arc::new(HeadlessBackend::new());
    let store = Arc::new(SettingsStore::open(h.store.path()));
    let restarted = Harness::build(h.temp.path(), backend.clone(), store);
    restarted.initialize().await;

    let clock = restarted.instance("clock").unwrap();
    assert_eq!(clock.state.position, Position::new(7, 8));
    assert!(!clock.state.enabled);
    assert_eq!(backend.live_count(), 0);
}
