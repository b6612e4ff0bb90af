#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app_runtime;
mod desktop_bridge_commands;
mod exit_events;
mod native_print;
mod pdf_export;
mod tauri_host;
mod webview_job;
mod window_actions;

pub(crate) use schooldesk_shell::logging::{
    append_desktop_log, append_shutdown_log, append_startup_log,
};

fn main() {
    app_runtime::run();
}
