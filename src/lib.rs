mod catalog;
mod channel;
mod config;
mod controller;
mod error;
mod events;
mod gateway;
mod logger;
mod progress;
mod state;

use std::sync::Arc;

use tauri::State;

use crate::config::HostConfig;
use crate::controller::LaunchSessionController;
use crate::events::BackendEvent;
use crate::gateway::{BackendGateway, DiagnosticReport, HttpGateway};
use crate::state::{Branch, SessionSnapshot};

struct LauncherState {
    controller: Arc<LaunchSessionController>,
}

#[tauri::command]
fn session_snapshot(state: State<'_, LauncherState>) -> SessionSnapshot {
    state.controller.snapshot()
}

#[tauri::command]
async fn rename(state: State<'_, LauncherState>, nickname: String) -> Result<bool, String> {
    state.controller.rename(&nickname).await?;
    Ok(true)
}

#[tauri::command]
async fn select_branch(state: State<'_, LauncherState>, branch: String) -> Result<bool, String> {
    let branch = Branch::from_wire(&branch).ok_or_else(|| format!("unknown branch: {branch}"))?;
    state.controller.select_branch(branch).await?;
    Ok(true)
}

#[tauri::command]
async fn select_version(state: State<'_, LauncherState>, version: String) -> Result<bool, String> {
    state.controller.select_version(&version).await?;
    Ok(true)
}

#[tauri::command]
async fn play(
    state: State<'_, LauncherState>,
    nickname: String,
    server_address: Option<String>,
) -> Result<bool, String> {
    state
        .controller
        .play(&nickname, server_address.as_deref())
        .await?;
    Ok(true)
}

#[tauri::command]
async fn request_self_update(state: State<'_, LauncherState>) -> Result<bool, String> {
    state.controller.request_self_update().await?;
    Ok(true)
}

#[tauri::command]
fn dismiss_error(state: State<'_, LauncherState>) {
    state.controller.dismiss_error();
}

#[tauri::command]
fn advance_news(state: State<'_, LauncherState>) {
    state.controller.advance_news();
}

#[tauri::command]
async fn run_diagnostics(state: State<'_, LauncherState>) -> Result<DiagnosticReport, String> {
    state.controller.run_diagnostics().await
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let host_config = HostConfig::from_env();
    let gateway: Arc<dyn BackendGateway> = Arc::new(HttpGateway::new(&host_config));
    let controller = Arc::new(LaunchSessionController::new(gateway));

    tauri::Builder::default()
        .manage(LauncherState {
            controller: Arc::clone(&controller),
        })
        .setup(move |app| {
            // File logging (AppDataDir/logs/nebula-launcher.log)
            logger::init(&app.handle()).map_err(|e| tauri::Error::Setup(e.into()))?;

            // Mirror every accepted store mutation to the webview.
            let handle = app.handle().clone();
            controller.store().subscribe(move |snapshot| {
                progress::emit_session_state(&handle, snapshot);
            });

            // Initial session load against the host service.
            let boot = Arc::clone(&controller);
            tauri::async_runtime::spawn(async move {
                boot.bootstrap().await;
            });

            // Push-event pump. Frames apply in arrival order; unknown
            // event names are dropped.
            let pump = Arc::clone(&controller);
            let mut events = channel::spawn_event_listener(host_config.events_url.clone());
            tauri::async_runtime::spawn(async move {
                while let Some(raw) = events.recv().await {
                    match BackendEvent::parse(&raw.name, &raw.payload) {
                        Some(event) => pump.handle_event(event),
                        None => log::debug!("ignoring unknown event: {}", raw.name),
                    }
                }
            });

            Ok(())
        })
        .plugin(tauri_plugin_opener::init())
        .invoke_handler(tauri::generate_handler![
            session_snapshot,
            rename,
            select_branch,
            select_version,
            play,
            request_self_update,
            dismiss_error,
            advance_news,
            run_diagnostics
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
