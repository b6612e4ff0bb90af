use std::{
    path::Path,
    process::{Command, ExitStatus, Stdio},
    thread::{self, JoinHandle},
};

#[cfg(target_os = "macos")]
pub fn open_with_system_viewer(path: &Path) -> Result<(), String> {
    let mut command = Command::new("open");
    command.arg(path);
    spawn_reaped(command, "open").map(drop)
}

#[cfg(target_os = "windows")]
pub fn open_with_system_viewer(path: &Path) -> Result<(), String> {
    use std::os::windows::process::CommandExt;

    let mut command = Command::new("rundll32");
    command
        .arg("url.dll,FileProtocolHandler")
        .arg(path)
        .creation_flags(crate::process_control::CREATE_NO_WINDOW);
    spawn_reaped(command, "rundll32").map(drop)
}

#[cfg(all(unix, not(target_os = "macos")))]
pub fn open_with_system_viewer(path: &Path) -> Result<(), String> {
    let mut command = Command::new("xdg-open");
    command.arg(path);
    spawn_reaped(command, "xdg-open").map(drop)
}

#[cfg(not(any(target_os = "macos", target_os = "windows", unix)))]
pub fn open_with_system_viewer(_path: &Path) -> Result<(), String> {
    Err("Opening files is not supported on this platform.".to_string())
}

/// Launches a short-lived opener and waits for it on a detached thread so
/// it never lingers as a zombie.
fn spawn_reaped(
    mut command: Command,
    program: &str,
) -> Result<Option<JoinHandle<Option<ExitStatus>>>, String> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|error| format!("Failed to run '{program}': {error}"))?;

    // The opener already started; a missing reaper only costs a zombie.
    Ok(thread::Builder::new()
        .name(format!("{program}-reaper"))
        .spawn(move || child.wait().ok())
        .ok())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn opener_process_is_waited_on() {
        let reaper = spawn_reaped(Command::new("true"), "true")
            .expect("spawn true")
            .expect("reaper thread");

        let status = reaper.join().expect("join reaper").expect("exit status");
        assert!(status.success());
    }

    #[test]
    fn missing_opener_is_reported() {
        let error = spawn_reaped(Command::new("schooldesk-no-such-opener"), "opener")
            .expect_err("spawn should fail");
        assert!(error.starts_with("Failed to run 'opener'"));
    }
}
