#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Control-plane commands end to end, including the widget store.

use nxui_core::Rect;
use nxui_ecosystem::{RegistryClient, WidgetInstaller};
use nxui_engine::{Command, CommandRouter, WidgetManager};
use nxui_runtime::ScriptLoader;
use nxui_store::{SettingsStore, SETTINGS_FILE};
use nxui_surfaces::{BatchTiming, HeadlessBackend, StaticDisplay};
use serde_json::json;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const CLOCK: &str = r#"
import "nxui/sdk" as sdk;

sdk::define_widget(#{
    name: "Clock",
    version: "1.0.0",
    author: "NxUI",
    width: 300,
    height: 150,
    settings: [
        #{ key: "format", label: "Format", type: "select", "default": "24h", options: ["12h", "24h"] },
    ],
    render: || "<div>clock</div>",
})
"#;

struct Fixture {
    _temp: TempDir,
    backend: Arc<HeadlessBackend>,
    router: CommandRouter,
}

async fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let widgets = temp.path().join("widgets");
    fs::create_dir(&widgets).unwrap();
    fs::write(widgets.join("clock.widget.rhai"), CLOCK).unwrap();

    let backend = Arc::new(HeadlessBackend::new());
    let manager = WidgetManager::new(
        widgets.clone(),
        Arc::new(ScriptLoader::default()),
        Arc::new(SettingsStore::open(temp.path().join(SETTINGS_FILE))),
        backend.clone(),
        Arc::new(StaticDisplay(Rect::new(0, 0, 1920, 1080))),
    )
    .with_batch_timing(BatchTiming {
        step: Duration::from_millis(1),
        settle: Duration::from_millis(5),
    });
    let manager = Arc::new(manager);
    manager.initialize().await;

    // Nothing listens on port 1, so the built-in listing is served.
    let registry =
        RegistryClient::new("http://127.0.0.1:1/registry.json", Duration::from_secs(2)).unwrap();
    let installer = Arc::new(WidgetInstaller::new(widgets, registry));
    Fixture {
        _temp: temp,
        backend,
        router: CommandRouter::new(manager).with_installer(installer),
    }
}

#[tokio::test]
async fn test_list_reports_loaded_widgets() {
    let f = fixture().await;
    let response = f.router.execute(Command::List).await;
    assert!(response.success);
    let rows = response.data.unwrap();
    assert_eq!(rows[0]["id"], json!("clock"));
    assert_eq!(rows[0]["enabled"], json!(true));
    assert_eq!(rows[0]["settings"][0]["key"], json!("format"));
}

#[tokio::test]
async fn test_toggle_unknown_is_a_successful_noop() {
    let f = fixture().await;
    let response = f
        .router
        .execute_json(r#"{"command": "toggle", "id": "ghost", "enabled": true}"#)
        .await;
    assert!(response.success);
    assert_eq!(response.data.unwrap()["changed"], json!(false));
    assert_eq!(f.backend.live_count(), 1);
}

#[tokio::test]
async fn test_reload_unknown_fails() {
    let f = fixture().await;
    let response = f
        .router
        .execute(Command::Reload { id: "ghost".into() })
        .await;
    assert!(!response.success);
    assert_eq!(response.data.unwrap()["kind"], json!("unknown_widget"));
}

#[tokio::test]
async fn test_malformed_command_is_reported() {
    let f = fixture().await;
    let response = f.router.execute_json("{not json").await;
    assert!(!response.success);
    assert!(response.error.unwrap().starts_with("Invalid command"));

    let response = f.router.execute_json(r#"{"command": "explode"}"#).await;
    assert!(!response.success);
}

#[tokio::test]
async fn test_settings_round_trip_through_commands() {
    let f = fixture().await;
    let set = f
        .router
        .execute_json(r#"{"command": "set-setting", "id": "clock", "key": "format", "value": "12h"}"#)
        .await;
    assert!(set.success, "{:?}", set.error);

    let get = f
        .router
        .execute(Command::GetSetting {
            id: "clock".into(),
            key: "format".into(),
        })
        .await;
    assert_eq!(get.data.unwrap()["value"], json!("12h"));

    let bad = f
        .router
        .execute(Command::SetSetting {
            id: "clock".into(),
            key: "format".into(),
            value: json!("48h"),
        })
        .await;
    assert!(!bad.success);
    assert_eq!(bad.data.unwrap()["kind"], json!("invalid_setting"));
}

#[tokio::test]
async fn test_profiles_through_commands() {
    let f = fixture().await;
    assert!(f.router.execute(Command::SaveProfile { name: "desk".into() }).await.success);

    let listed = f.router.execute(Command::ListProfiles).await;
    assert!(listed.data.unwrap()["desk"]["clock"].is_object());

    let applied = f.router.execute(Command::ApplyProfile { name: "desk".into() }).await;
    assert_eq!(applied.data.unwrap()["applied"], json!(1));

    assert!(f.router.execute(Command::DeleteProfile { name: "desk".into() }).await.success);
    let missing = f.router.execute(Command::GetProfile { name: "desk".into() }).await;
    assert!(!missing.success);
    assert_eq!(missing.data.unwrap()["kind"], json!("profile_not_found"));
}

#[tokio::test]
async fn test_toggle_all_alternates() {
    let f = fixture().await;
    let first = f.router.execute(Command::ToggleAll).await.data.unwrap();
    assert_eq!(first, json!({ "action": "hide", "count": 1 }));
    let second = f.router.execute(Command::ToggleAll).await.data.unwrap();
    assert_eq!(second, json!({ "action": "show", "count": 1 }));
}

#[tokio::test]
async fn test_theme_commands() {
    let f = fixture().await;
    let themes = f.router.execute(Command::ListThemes).await.data.unwrap();
    assert!(themes.as_array().unwrap().len() >= 5);

    assert!(f.router.execute(Command::SetTheme { id: "midnight".into() }).await.success);
    let themes = f.router.execute(Command::ListThemes).await.data.unwrap();
    let active: Vec<_> = themes
        .as_array()
        .unwrap()
        .iter()
        .filter(|t| t["active"] == json!(true))
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["id"], json!("midnight"));

    assert!(!f.router.execute(Command::SetTheme { id: "nope".into() }).await.success);
}

#[tokio::test]
async fn test_install_and_uninstall_from_store() {
    let f = fixture().await;
    let registry = f.router.execute(Command::Registry).await.data.unwrap();
    assert!(registry
        .as_array()
        .unwrap()
        .iter()
        .any(|entry| entry["id"] == json!("calc-pro")));

    let installed = f
        .router
        .execute(Command::Install { id: "calc-pro".into() })
        .await;
    assert!(installed.success, "{:?}", installed.error);
    assert_eq!(installed.data.unwrap()["loaded"], json!(true));
    assert!(f.router.manager().instance("calc-pro").is_some());
    assert_eq!(f.backend.live("calc-pro").len(), 1);

    let removed = f
        .router
        .execute(Command::Uninstall { id: "calc-pro".into() })
        .await;
    assert!(removed.success);
    assert!(f.router.manager().instance("calc-pro").is_none());
    assert!(!f.router.manager().root().join("calc-pro").exists());

    let again = f
        .router
        .execute(Command::Uninstall { id: "calc-pro".into() })
        .await;
    assert!(!again.success);
    assert_eq!(again.data.unwrap()["kind"], json!("unknown_widget"));
}

#[tokio::test]
async fn test_install_unknown_entry_fails() {
    let f = fixture().await;
    let response = f
        .router
        .execute(Command::Install { id: "not-in-registry".into() })
        .await;
    assert!(!response.success);
    assert_eq!(response.data.unwrap()["kind"], json!("install_error"));
}
