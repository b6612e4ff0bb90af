use std::{
    io,
    process::{Child, ExitStatus},
};

#[cfg(target_os = "windows")]
pub(crate) const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Kills the child (and on Windows its whole tree) and reaps it.
pub fn stop_child_process(child: &mut Child) -> io::Result<ExitStatus> {
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        use std::process::{Command, Stdio};

        let taskkill = Command::new("taskkill")
            .args(["/pid", &child.id().to_string(), "/t", "/f"])
            .creation_flags(CREATE_NO_WINDOW)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .status();
        if taskkill.is_err() {
            let _ = child.kill();
        }
        child.wait()
    }

    #[cfg(not(target_os = "windows"))]
    {
        if let Err(error) = child.kill() {
            // Already exited children report InvalidInput; reaping still works.
            if error.kind() != io::ErrorKind::InvalidInput {
                return Err(error);
            }
        }
        child.wait()
    }
}

/// Splits an exit status into (code, signal).
pub fn exit_code_and_signal(status: &ExitStatus) -> (Option<i32>, Option<i32>) {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        (status.code(), status.signal())
    }

    #[cfg(not(unix))]
    {
        (status.code(), None)
    }
}

pub fn describe_exit(code: Option<i32>, signal: Option<i32>) -> String {
    match (code, signal) {
        (Some(code), _) => format!("code {code}"),
        (None, Some(signal)) => format!("signal {signal}"),
        (None, None) => "unknown status".to_string(),
    }
}
