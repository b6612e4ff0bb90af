//! Platform-neutral core of the SchoolDesk desktop shell: backend process
//! supervision, health probing, splash/main window handoff and the IPC
//! command gateway. The GUI crate plugs native windows and dialogs in through
//! [`ShellWindow`], [`WindowFactory`], [`PrintHost`] and [`OperatorAlerts`].

mod app_constants;
pub mod backend_config;
pub mod backend_process;
pub mod backend_restart;
pub mod health_probe;
pub mod ipc;
pub mod logging;
pub mod operator_alerts;
pub mod process_control;
mod run_mode;
pub mod runtime_paths;
pub mod single_instance;
pub mod startup_task;
pub mod system_open;
pub mod window_coordinator;

#[cfg(test)]
pub(crate) mod test_support;

pub use app_constants::*;
pub use backend_config::{ConfigError, LaunchPlan, LoadSource, ShellConfig};
pub use backend_process::{
    BackendEvent, BackendProcessState, BackendStatus, BackendSupervisor, ProcessHandle,
    SpawnError,
};
pub use backend_restart::{BackendController, RestartOutcome};
pub use health_probe::{HealthProber, ProbeReport};
pub use ipc::{BridgeResult, EphemeralContent, IpcCommand, IpcGateway, PrintHost, PrintOptions};
pub use logging::{install_panic_logger, BackendStream, DesktopLogCategory, LogSink};
pub use operator_alerts::OperatorAlerts;
pub use run_mode::RunMode;
pub use single_instance::SecondInstanceHandler;
pub use startup_task::{DesktopShell, StartupOutcome};
pub use window_coordinator::{
    MainWindowTarget, ShellWindow, WindowCoordinator, WindowFactory, WindowPhase, WindowState,
};
