use std::sync::Arc;

use schooldesk_shell::{
    install_panic_logger, DesktopShell, IpcGateway, LogSink, OperatorAlerts,
    SecondInstanceHandler, ShellConfig, StartupOutcome,
};
use tauri::{App, Manager};

use crate::{
    append_startup_log, desktop_bridge_commands, exit_events,
    tauri_host::{TauriAlerts, TauriPrintHost, TauriWindowFactory},
    window_actions,
};

pub(crate) type ShellGateway = IpcGateway<TauriWindowFactory, TauriPrintHost>;

/// Everything the Tauri callbacks need, managed once setup has resolved the
/// configuration.
pub(crate) struct ShellState {
    pub(crate) shell: Arc<DesktopShell<TauriWindowFactory>>,
    pub(crate) gateway: ShellGateway,
    pub(crate) print_host: Arc<TauriPrintHost>,
    pub(crate) alerts: Arc<TauriAlerts>,
    pub(crate) second_instance: SecondInstanceHandler<TauriWindowFactory>,
}

pub(crate) fn run() {
    let log = LogSink::global();
    install_panic_logger(Arc::clone(&log));
    append_startup_log("desktop process starting");
    append_startup_log(&format!("desktop log path: {}", log.describe_location()));

    tauri::Builder::default()
        .plugin(tauri_plugin_single_instance::init(|app_handle, args, cwd| {
            match app_handle.try_state::<ShellState>() {
                Some(state) => state.second_instance.on_second_launch(&args, &cwd),
                None => append_startup_log("second launch ignored: shell not initialized yet"),
            }
        }))
        .plugin(tauri_plugin_dialog::init())
        .invoke_handler(tauri::generate_handler![
            desktop_bridge_commands::desktop_bridge_open_folder_dialog,
            desktop_bridge_commands::desktop_bridge_close_splash,
            desktop_bridge_commands::desktop_bridge_get_backend_base,
            desktop_bridge_commands::desktop_bridge_restart_backend,
            desktop_bridge_commands::desktop_bridge_print_current,
            desktop_bridge_commands::desktop_bridge_print_html,
            desktop_bridge_commands::desktop_bridge_print_url,
            desktop_bridge_commands::desktop_bridge_preview_current,
            desktop_bridge_commands::desktop_bridge_preview_html,
            desktop_bridge_commands::desktop_bridge_preview_pdf,
        ])
        .on_window_event(window_actions::handle_window_event)
        .on_page_load(window_actions::handle_page_load)
        .setup(move |app| {
            setup_shell(app, log);
            Ok(())
        })
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(exit_events::handle_run_event);
}

fn setup_shell(app: &mut App, log: Arc<LogSink>) {
    let app_handle = app.handle().clone();
    let alerts = Arc::new(TauriAlerts::new(app_handle.clone()));
    let resource_dir = app_handle.path().resource_dir().ok();

    let config = match ShellConfig::from_env(resource_dir.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            append_startup_log(&format!("invalid shell configuration: {error}"));
            alerts.show_error(
                "SchoolDesk configuration error",
                &format!("{error}\n\nLogs: {}", log.describe_location()),
            );
            return;
        }
    };

    let factory = TauriWindowFactory::new(app_handle.clone());
    let shell = match DesktopShell::new(config, factory, alerts.clone(), log) {
        Ok(shell) => Arc::new(shell),
        Err(error) => {
            append_startup_log(&format!("failed to initialize shell: {error}"));
            alerts.show_error("SchoolDesk failed to start", &error);
            return;
        }
    };
    let print_host = Arc::new(TauriPrintHost::new(app_handle.clone()));
    let gateway = shell.gateway(Arc::clone(&print_host));
    let second_instance = shell.second_instance_handler();

    app_handle.manage(ShellState {
        shell: Arc::clone(&shell),
        gateway,
        print_host,
        alerts,
        second_instance,
    });

    tauri::async_runtime::spawn(async move {
        match shell.run_startup().await {
            StartupOutcome::MainWindowCreated { backend_healthy } => append_startup_log(&format!(
                "startup finished: main window created (backend healthy: {backend_healthy:?})"
            )),
            StartupOutcome::BackendUnavailable => {
                append_startup_log("startup stopped: backend unavailable")
            }
            StartupOutcome::FrontendUnavailable => {
                append_startup_log("startup stopped: frontend unavailable")
            }
        }
    });
}
