//! The renderer's whole command surface. Each command forwards to the
//! gateway and always answers with a `BridgeResult`.

use schooldesk_shell::{BridgeResult, PrintOptions};
use tauri::{AppHandle, Manager};

use crate::app_runtime::ShellState;

const SHELL_NOT_READY: &str = "Desktop shell is not initialized.";

macro_rules! shell_state_or_fail {
    ($app_handle:expr) => {
        match $app_handle.try_state::<ShellState>() {
            Some(state) => state,
            None => return BridgeResult::failure(SHELL_NOT_READY),
        }
    };
}

#[tauri::command]
pub(crate) async fn desktop_bridge_open_folder_dialog(
    app_handle: AppHandle,
) -> BridgeResult<String> {
    let state = shell_state_or_fail!(app_handle);
    state.gateway.open_folder_dialog().await
}

#[tauri::command]
pub(crate) fn desktop_bridge_close_splash(app_handle: AppHandle) -> BridgeResult<()> {
    let state = shell_state_or_fail!(app_handle);
    state.gateway.close_splash()
}

#[tauri::command]
pub(crate) fn desktop_bridge_get_backend_base(app_handle: AppHandle) -> BridgeResult<String> {
    let state = shell_state_or_fail!(app_handle);
    state.gateway.get_backend_base()
}

#[tauri::command]
pub(crate) async fn desktop_bridge_restart_backend(app_handle: AppHandle) -> BridgeResult<String> {
    let state = shell_state_or_fail!(app_handle);
    state.gateway.restart_backend().await
}

#[tauri::command]
pub(crate) async fn desktop_bridge_print_current(
    app_handle: AppHandle,
    options: Option<PrintOptions>,
) -> BridgeResult<()> {
    let state = shell_state_or_fail!(app_handle);
    state
        .gateway
        .print_current(&options.unwrap_or_default())
        .await
}

#[tauri::command]
pub(crate) async fn desktop_bridge_print_html(
    app_handle: AppHandle,
    html: String,
    options: Option<PrintOptions>,
) -> BridgeResult<()> {
    let state = shell_state_or_fail!(app_handle);
    state
        .gateway
        .print_html(html, &options.unwrap_or_default())
        .await
}

#[tauri::command]
pub(crate) async fn desktop_bridge_print_url(
    app_handle: AppHandle,
    url: String,
    options: Option<PrintOptions>,
) -> BridgeResult<()> {
    let state = shell_state_or_fail!(app_handle);
    state
        .gateway
        .print_url(&url, &options.unwrap_or_default())
        .await
}

#[tauri::command]
pub(crate) async fn desktop_bridge_preview_current(app_handle: AppHandle) -> BridgeResult<String> {
    let state = shell_state_or_fail!(app_handle);
    state.gateway.preview_current().await
}

#[tauri::command]
pub(crate) async fn desktop_bridge_preview_html(
    app_handle: AppHandle,
    html: String,
) -> BridgeResult<String> {
    let state = shell_state_or_fail!(app_handle);
    state.gateway.preview_html(html).await
}

#[tauri::command]
pub(crate) async fn desktop_bridge_preview_pdf(
    app_handle: AppHandle,
    data: String,
) -> BridgeResult<String> {
    let state = shell_state_or_fail!(app_handle);
    state.gateway.preview_pdf(&data).await
}
