use tauri::{AppHandle, ExitRequestApi, Manager, RunEvent};

use crate::{app_runtime::ShellState, append_shutdown_log};

pub(crate) fn handle_run_event(app_handle: &AppHandle, event: RunEvent) {
    match event {
        RunEvent::ExitRequested { code, api, .. } => {
            handle_exit_requested(app_handle, code, &api);
        }
        RunEvent::Exit => handle_exit_event(app_handle),
        #[cfg(target_os = "macos")]
        RunEvent::Reopen {
            has_visible_windows: false,
            ..
        } => crate::window_actions::reopen_main_window(app_handle),
        _ => {}
    }
}

/// The last window closing keeps the process alive while an operator dialog
/// is still open, and on macOS where the app lives on in the dock.
fn handle_exit_requested(app_handle: &AppHandle, code: Option<i32>, api: &ExitRequestApi) {
    let Some(state) = app_handle.try_state::<ShellState>() else {
        return;
    };
    if code.is_none() && (state.alerts.has_open_dialog() || cfg!(target_os = "macos")) {
        append_shutdown_log("exit deferred: all windows closed but the shell stays alive");
        api.prevent_exit();
        return;
    }

    append_shutdown_log(&format!("exit requested (code {code:?})"));
    if !state.shell.shutdown() {
        append_shutdown_log("backend already stopped");
    }
}

fn handle_exit_event(app_handle: &AppHandle) {
    match app_handle.try_state::<ShellState>() {
        Some(state) => {
            if state.shell.shutdown() {
                append_shutdown_log("backend stopped on exit");
            }
        }
        None => append_shutdown_log("exit without an initialized shell"),
    }
    append_shutdown_log("desktop process exiting");
}
