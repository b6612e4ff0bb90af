use std::path::Path;

/// Blocking, operator-facing error dialogs. Implementations must not panic;
/// a dialog that cannot be shown is only logged.
pub trait OperatorAlerts: Send + Sync {
    fn show_error(&self, title: &str, message: &str);
}

pub const ENTRY_SCRIPT_MISSING_TITLE: &str = "Backend files missing";
pub const BACKEND_UNHEALTHY_TITLE: &str = "Backend not responding";
pub const BACKEND_SPAWN_FAILED_TITLE: &str = "Backend failed to start";
pub const FRONTEND_LOAD_FAILED_TITLE: &str = "Dashboard failed to load";

pub fn entry_script_missing_message(entry: &Path, log_location: &str) -> String {
    format!(
        "The backend entry script was not found:\n{}\n\n\
         The installation looks incomplete. Reinstall SchoolDesk or check the packaging.\n\n\
         Logs: {log_location}",
        entry.display()
    )
}

pub fn backend_spawn_failed_message(
    reason: &str,
    log_location: &str,
    config_file: &Path,
) -> String {
    format!(
        "The backend process could not be started:\n{reason}\n\n\
         Logs: {log_location}\nBackend configuration: {}",
        config_file.display()
    )
}

pub fn backend_unhealthy_message(
    port: u16,
    waited_ms: u128,
    log_location: &str,
    config_file: &Path,
) -> String {
    format!(
        "The backend did not report healthy on port {port} within {waited_ms}ms.\n\
         Check that its database is reachable and the configuration is valid.\n\n\
         Logs: {log_location}\nBackend configuration: {}",
        config_file.display()
    )
}

pub fn frontend_load_failed_message(target: &str, reason: &str, log_location: &str) -> String {
    format!(
        "The dashboard could not be loaded from {target}:\n{reason}\n\nLogs: {log_location}"
    )
}
