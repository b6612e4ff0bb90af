//! Top-level orchestration: owns the backend controller and the window
//! coordinator and runs the startup sequence once the GUI event loop is up.

use std::{path::PathBuf, sync::Arc, time::Duration};

use crate::{
    backend_config::{LoadSource, ShellConfig},
    backend_process::{BackendSupervisor, SpawnError},
    backend_restart::BackendController,
    health_probe::HealthProber,
    ipc::{IpcGateway, PrintHost},
    logging::{DesktopLogCategory, LogSink},
    operator_alerts::{self, OperatorAlerts},
    single_instance::SecondInstanceHandler,
    window_coordinator::{MainWindowTarget, WindowCoordinator, WindowFactory},
    APP_DATA_DIR_NAME, DEV_SERVER_PROBE_TIMEOUT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupOutcome {
    /// The main window exists. `backend_healthy` is `None` when the backend
    /// is managed outside the shell.
    MainWindowCreated { backend_healthy: Option<bool> },
    /// The backend could not be launched; the operator has been told why.
    BackendUnavailable,
    /// The main window could not be created; the operator has been told why.
    FrontendUnavailable,
}

pub struct DesktopShell<F: WindowFactory> {
    config: ShellConfig,
    backend: Arc<BackendController>,
    windows: Arc<WindowCoordinator<F>>,
    alerts: Arc<dyn OperatorAlerts>,
    dev_server_probe_timeout: Duration,
    log: Arc<LogSink>,
}

impl<F: WindowFactory> DesktopShell<F> {
    pub fn new(
        config: ShellConfig,
        factory: F,
        alerts: Arc<dyn OperatorAlerts>,
        log: Arc<LogSink>,
    ) -> Result<Self, String> {
        let supervisor = BackendSupervisor::new(config.backend_port, Arc::clone(&log));
        let prober = HealthProber::new(Arc::clone(&log))?;
        let backend = Arc::new(BackendController::new(
            &config,
            supervisor,
            prober,
            Arc::clone(&log),
        ));
        let windows = Arc::new(WindowCoordinator::new(
            config.mode,
            factory,
            Arc::clone(&alerts),
            Arc::clone(&log),
        ));
        Ok(Self {
            config,
            backend,
            windows,
            alerts,
            dev_server_probe_timeout: DEV_SERVER_PROBE_TIMEOUT,
            log,
        })
    }

    pub fn with_dev_server_probe_timeout(mut self, timeout: Duration) -> Self {
        self.dev_server_probe_timeout = timeout;
        self
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<BackendController> {
        &self.backend
    }

    pub fn windows(&self) -> &Arc<WindowCoordinator<F>> {
        &self.windows
    }

    pub fn log(&self) -> &Arc<LogSink> {
        &self.log
    }

    pub fn main_window_target(&self) -> MainWindowTarget {
        MainWindowTarget::new(self.config.load_source(), self.backend.supervisor().port())
    }

    pub fn second_instance_handler(&self) -> SecondInstanceHandler<F> {
        SecondInstanceHandler::new(Arc::clone(&self.windows), Arc::clone(&self.log))
    }

    pub fn gateway<P: PrintHost>(&self, host: Arc<P>) -> IpcGateway<F, P> {
        IpcGateway::new(
            Arc::clone(&self.windows),
            Arc::clone(&self.backend),
            host,
            preview_dir(),
            Arc::clone(&self.log),
        )
    }

    /// Splash first, then the backend, then the main window. Operator-facing
    /// failures raise a blocking dialog but never end the process.
    pub async fn run_startup(&self) -> StartupOutcome {
        self.log.append(
            DesktopLogCategory::Startup,
            &format!(
                "starting shell in {} mode (backend port {}, managed: {})",
                self.config.mode, self.config.backend_port, self.config.manage_backend
            ),
        );

        if let Err(error) = self.windows.create_splash() {
            self.log.append(
                DesktopLogCategory::Startup,
                &format!("continuing without splash: {error}"),
            );
        }

        let backend_healthy = if self.config.manage_backend {
            match self.backend.start_and_wait(self.config.startup_timeout).await {
                Ok(healthy) => {
                    if !healthy {
                        self.alerts.show_error(
                            operator_alerts::BACKEND_UNHEALTHY_TITLE,
                            &operator_alerts::backend_unhealthy_message(
                                self.backend.supervisor().port(),
                                self.config.startup_timeout.as_millis(),
                                &self.log.describe_location(),
                                &self.config.backend_config_file,
                            ),
                        );
                    }
                    Some(healthy)
                }
                Err(error) => {
                    self.report_spawn_failure(&error);
                    return StartupOutcome::BackendUnavailable;
                }
            }
        } else {
            self.log.append(
                DesktopLogCategory::Startup,
                "backend is externally managed; skipping spawn",
            );
            None
        };

        let target = self.main_window_target();
        if let LoadSource::DevServer(url) = &target.source {
            let report = self
                .backend
                .prober()
                .probe_until(url.as_str(), self.dev_server_probe_timeout)
                .await;
            if !report.healthy {
                self.windows.on_main_load_failed(
                    url.as_str(),
                    &format!(
                        "dev server did not respond within {}ms",
                        self.dev_server_probe_timeout.as_millis()
                    ),
                );
            }
        }

        match self.windows.create_main(target) {
            Ok(()) => StartupOutcome::MainWindowCreated { backend_healthy },
            Err(_) => StartupOutcome::FrontendUnavailable,
        }
    }

    /// Kills the backend at most once, whichever quit hook arrives first.
    pub fn shutdown(&self) -> bool {
        self.backend.supervisor().shutdown()
    }

    /// The alert is raised before the splash closes; closing the last window
    /// first would let the app exit before the dialog is registered.
    fn report_spawn_failure(&self, error: &SpawnError) {
        let location = self.log.describe_location();
        match error {
            SpawnError::EntryScriptMissing(entry) => self.alerts.show_error(
                operator_alerts::ENTRY_SCRIPT_MISSING_TITLE,
                &operator_alerts::entry_script_missing_message(entry, &location),
            ),
            other => self.alerts.show_error(
                operator_alerts::BACKEND_SPAWN_FAILED_TITLE,
                &operator_alerts::backend_spawn_failed_message(
                    &other.to_string(),
                    &location,
                    &self.config.backend_config_file,
                ),
            ),
        }
        self.windows.close_splash_now();
    }
}

fn preview_dir() -> PathBuf {
    std::env::temp_dir().join(APP_DATA_DIR_NAME)
}
