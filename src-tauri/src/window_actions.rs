use tauri::{webview::PageLoadEvent, Manager, Webview, Window, WindowEvent};

use schooldesk_shell::MAIN_WINDOW_LABEL;

use crate::{app_runtime::ShellState, append_desktop_log, tauri_host::PRINT_WINDOW_PREFIX};

pub(crate) fn handle_window_event(window: &Window, event: &WindowEvent) {
    if !matches!(event, WindowEvent::Destroyed) {
        return;
    }
    let label = window.label();
    append_desktop_log(&format!("window destroyed: {label}"));
    let Some(state) = window.app_handle().try_state::<ShellState>() else {
        return;
    };
    if label.starts_with(PRINT_WINDOW_PREFIX) {
        state.print_host.on_window_destroyed(label);
    } else {
        state.shell.windows().on_window_destroyed(label);
    }
}

pub(crate) fn handle_page_load(webview: &Webview, payload: &tauri::webview::PageLoadPayload<'_>) {
    if !matches!(payload.event(), PageLoadEvent::Finished) {
        return;
    }
    let label = webview.label();
    let Some(state) = webview.app_handle().try_state::<ShellState>() else {
        return;
    };

    if label.starts_with(PRINT_WINDOW_PREFIX) {
        state.print_host.on_page_loaded(label);
    } else if label == MAIN_WINDOW_LABEL {
        append_desktop_log(&format!("page-load finished: {}", payload.url()));
        state.shell.windows().on_main_content_loaded();
    }
}

/// Dock-icon activation with no visible window.
#[cfg(target_os = "macos")]
pub(crate) fn reopen_main_window(app_handle: &tauri::AppHandle) {
    if let Some(state) = app_handle.try_state::<ShellState>() {
        state.shell.windows().reactivate();
    }
}
