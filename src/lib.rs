#[cfg(target_os = "macos")]
#[macro_use]
extern crate objc;

mod capture;
mod dispatch;
mod overlay;
mod pipeline;
mod rules;
mod services;
mod settings;
mod trigger;
mod window;

use std::sync::Arc;

use tauri::menu::{Menu, MenuItem};
use tauri::tray::{MouseButton, MouseButtonState, TrayIconBuilder, TrayIconEvent};
use tauri::{Listener, Manager, State, WindowEvent};
use tauri_plugin_opener::OpenerExt;

use capture::CaptureSource;
use dispatch::{ActionResult, Dispatcher};
use overlay::commands::{
    overlay_activate, overlay_copy, overlay_digit, overlay_dismiss, overlay_move, overlay_select,
};
use overlay::OverlayController;
use pipeline::commands::{process_selection, trigger_selection};
use pipeline::PipelineController;
use rules::commands::{
    ai_generate_rule, get_actions_list, import_actions, reload_actions, save_actions,
};
use rules::RuleStore;
use services::{AiClient, ScriptRunner};
use settings::{HotkeyConfig, SettingsStore};
use trigger::TriggerListener;
use window::{WindowCoordinator, POPUP_LABEL};

pub(crate) struct AppState {
    pub(crate) pipeline: PipelineController,
    pub(crate) overlay: OverlayController,
    pub(crate) rules: Arc<RuleStore>,
    pub(crate) settings: Arc<SettingsStore>,
    pub(crate) ai: Arc<AiClient>,
    pub(crate) scripts: Arc<ScriptRunner>,
    pub(crate) coordinator: WindowCoordinator,
}

#[tauri::command]
async fn open_url(app: tauri::AppHandle, url: String) -> Result<(), String> {
    app.opener()
        .open_url(&url, None::<&str>)
        .map_err(|e| e.to_string())
}

#[tauri::command]
async fn open_path(app: tauri::AppHandle, path: String) -> Result<(), String> {
    app.opener()
        .open_path(path.trim(), None::<&str>)
        .map_err(|e| e.to_string())
}

#[tauri::command]
async fn set_window_visibility(
    state: State<'_, AppState>,
    label: String,
    visible: bool,
) -> Result<(), String> {
    state
        .coordinator
        .set_visible(&label, visible)
        .map_err(|e| e.to_string())
}

#[tauri::command]
async fn set_popup_position(state: State<'_, AppState>, x: f64, y: f64) -> Result<(), String> {
    state
        .coordinator
        .position_popup(capture::SpotlightPoint { x, y })
        .map_err(|e| e.to_string())
}

#[tauri::command]
async fn adjust_window_size(
    state: State<'_, AppState>,
    label: String,
    width: f64,
    height: f64,
) -> Result<(), String> {
    state
        .coordinator
        .adjust_size(&label, width, height)
        .map_err(|e| e.to_string())
}

#[tauri::command]
fn local_format_text(text: String) -> ActionResult {
    services::format::format_text(&text)
}

#[tauri::command]
async fn ai_translate(state: State<'_, AppState>, text: String) -> Result<ActionResult, String> {
    state.ai.translate(&text).await.map_err(|e| e.to_string())
}

#[tauri::command]
async fn ai_summarize(state: State<'_, AppState>, text: String) -> Result<ActionResult, String> {
    state.ai.summarize(&text).await.map_err(|e| e.to_string())
}

#[tauri::command]
async fn ai_process(
    state: State<'_, AppState>,
    text: String,
    intent: String,
) -> Result<ActionResult, String> {
    state
        .ai
        .process(&text, &intent)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
async fn execute_script(
    state: State<'_, AppState>,
    script_path: String,
    arguments: Vec<String>,
    source_text: String,
) -> Result<ActionResult, String> {
    state
        .scripts
        .run(&script_path, &arguments, &source_text)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
async fn update_hotkey_config(
    state: State<'_, AppState>,
    trigger_key: String,
    trigger_type: String,
    trigger_interval: u64,
) -> Result<(), String> {
    state
        .settings
        .update_hotkey(HotkeyConfig {
            trigger_key,
            trigger_type,
            trigger_interval,
        })
        .map_err(|e| e.to_string())
}

#[tauri::command]
async fn save_settings(state: State<'_, AppState>, settings: String) -> Result<(), String> {
    state
        .settings
        .replace_raw(&settings)
        .map_err(|e| e.to_string())
}

#[tauri::command]
async fn load_settings(state: State<'_, AppState>) -> Result<serde_json::Value, String> {
    state.settings.as_value().map_err(|e| e.to_string())
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("textspot starting up...");

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let result = (|| -> anyhow::Result<()> {
                let handle = app.handle().clone();

                let config_dir = app
                    .path()
                    .app_config_dir()
                    .map_err(|err| anyhow::anyhow!(err))?;
                std::fs::create_dir_all(&config_dir)?;

                let settings = Arc::new(SettingsStore::new(config_dir.join("settings.json"))?);
                let rules = Arc::new(RuleStore::new(config_dir.join("actions.json")));
                let ai = Arc::new(AiClient::new(settings.clone()));
                let scripts = Arc::new(ScriptRunner::new(config_dir.join("scripts")));
                let capture_source = Arc::new(CaptureSource::new());

                let coordinator = WindowCoordinator::new(handle.clone());
                let dispatcher = Arc::new(Dispatcher::new(
                    handle.clone(),
                    ai.clone(),
                    scripts.clone(),
                ));
                let overlay =
                    OverlayController::new(handle.clone(), dispatcher, coordinator.clone());
                let pipeline = PipelineController::new(
                    rules.clone(),
                    settings.clone(),
                    capture_source,
                    overlay.clone(),
                    coordinator.clone(),
                );

                TriggerListener::new(settings.clone(), pipeline.clone(), overlay.clone()).start();

                // Gesture events from the webviews funnel into the same
                // trigger entry point as the global listener. The payload is
                // either an [x, y] tuple or an {x, y} object.
                {
                    let pipeline = pipeline.clone();
                    app.listen_any("trigger-spotlight", move |event| {
                        match serde_json::from_str::<capture::SpotlightPoint>(event.payload()) {
                            Ok(point) => pipeline.request_trigger(Some(point)),
                            Err(err) => {
                                log::warn!("ignoring malformed trigger-spotlight payload: {err}")
                            }
                        }
                    });
                }

                // System tray: settings window, rule reload, quit.
                let settings_item = MenuItem::with_id(app, "settings", "Settings", true, None::<&str>)?;
                let reload_item =
                    MenuItem::with_id(app, "reload", "Reload Rules", true, None::<&str>)?;
                let quit_item = MenuItem::with_id(app, "quit", "Quit", true, None::<&str>)?;
                let tray_menu = Menu::with_items(app, &[&settings_item, &reload_item, &quit_item])?;

                let mut tray_builder = TrayIconBuilder::new();
                if let Some(icon) = app.default_window_icon() {
                    tray_builder = tray_builder.icon(icon.clone());
                }
                let tray = tray_builder
                    .menu(&tray_menu)
                    .on_menu_event(move |app: &tauri::AppHandle, event| match event.id.as_ref() {
                        "settings" => {
                            if let Some(window) = app.get_webview_window(window::MAIN_LABEL) {
                                let _ = window.show();
                                let _ = window.set_focus();
                            }
                        }
                        "reload" => {
                            if let Some(state) = app.try_state::<AppState>() {
                                state.rules.force_reload();
                            }
                        }
                        "quit" => {
                            app.exit(0);
                        }
                        _ => {}
                    })
                    .on_tray_icon_event(|tray: &tauri::tray::TrayIcon, event| {
                        if let TrayIconEvent::Click {
                            button: MouseButton::Left,
                            button_state: MouseButtonState::Up,
                            ..
                        } = event
                        {
                            let app = tray.app_handle();
                            if let Some(window) = app.get_webview_window(window::MAIN_LABEL) {
                                let _ = window.show();
                                let _ = window.set_focus();
                            }
                        }
                    })
                    .build(app)?;
                app.manage(tray);

                app.manage(AppState {
                    pipeline,
                    overlay,
                    rules,
                    settings,
                    ai,
                    scripts,
                    coordinator,
                });

                Ok(())
            })();

            result.map_err(|err| err.into())
        })
        .on_window_event(|window, event| {
            // Losing focus closes the popup from any state.
            if window.label() == POPUP_LABEL {
                if let WindowEvent::Focused(false) = event {
                    if let Some(state) = window.app_handle().try_state::<AppState>() {
                        let overlay = state.overlay.clone();
                        tauri::async_runtime::spawn(async move {
                            overlay.dismiss().await;
                        });
                    }
                }
            }
        })
        .invoke_handler(tauri::generate_handler![
            trigger_selection,
            process_selection,
            open_url,
            open_path,
            set_window_visibility,
            set_popup_position,
            adjust_window_size,
            local_format_text,
            ai_translate,
            ai_summarize,
            ai_process,
            execute_script,
            overlay_select,
            overlay_digit,
            overlay_move,
            overlay_activate,
            overlay_copy,
            overlay_dismiss,
            get_actions_list,
            save_actions,
            reload_actions,
            import_actions,
            ai_generate_rule,
            update_hotkey_config,
            save_settings,
            load_settings,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
