//! Line-oriented desktop log: every entry goes to stdout and, when the file
//! can be opened, to an append-only file under the per-user data directory.

use std::{
    fmt,
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, OnceLock},
};

use chrono::Local;

use crate::{runtime_paths, DESKTOP_LOG_FILE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopLogCategory {
    Startup,
    Runtime,
    Restart,
    Shutdown,
    Ipc,
    Window,
}

impl DesktopLogCategory {
    fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Runtime => "runtime",
            Self::Restart => "restart",
            Self::Shutdown => "shutdown",
            Self::Ipc => "ipc",
            Self::Window => "window",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendStream {
    Stdout,
    Stderr,
}

impl fmt::Display for BackendStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

pub struct LogSink {
    path: Option<PathBuf>,
    file: OnceLock<Option<Mutex<File>>>,
    echo_stdout: bool,
}

static GLOBAL_SINK: OnceLock<Arc<LogSink>> = OnceLock::new();

impl LogSink {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            file: OnceLock::new(),
            echo_stdout: true,
        }
    }

    /// A sink that only writes to its file; used where stdout is noise.
    pub fn file_only(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            file: OnceLock::new(),
            echo_stdout: false,
        }
    }

    /// Process-wide sink, created on first use.
    pub fn global() -> Arc<LogSink> {
        GLOBAL_SINK
            .get_or_init(|| {
                Arc::new(LogSink::new(Some(runtime_paths::resolve_desktop_log_path(
                    None,
                    DESKTOP_LOG_FILE,
                ))))
            })
            .clone()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Display form of the log location for operator-facing dialogs.
    pub fn describe_location(&self) -> String {
        match self.path() {
            Some(path) => path.display().to_string(),
            None => "standard output".to_string(),
        }
    }

    pub fn append(&self, category: DesktopLogCategory, message: &str) {
        self.write_line(category.as_str(), message);
    }

    pub fn append_backend(&self, stream: BackendStream, line: &str) {
        self.write_line(&format!("backend:{stream}"), line);
    }

    fn write_line(&self, tag: &str, message: &str) {
        let line = format!(
            "[{}] [{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            tag,
            message.trim_end()
        );

        if self.echo_stdout {
            println!("{line}");
        }

        let Some(file) = self.file.get_or_init(|| self.open_file()) else {
            return;
        };
        if let Ok(mut guard) = file.lock() {
            let _ = writeln!(guard, "{line}");
        }
    }

    fn open_file(&self) -> Option<Mutex<File>> {
        let path = self.path.as_ref()?;
        if let Some(parent) = path.parent() {
            if let Err(error) = fs::create_dir_all(parent) {
                eprintln!(
                    "desktop log directory {} unavailable, logging to stdout only: {error}",
                    parent.display()
                );
                return None;
            }
        }

        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(Mutex::new(file)),
            Err(error) => {
                eprintln!(
                    "desktop log file {} unavailable, logging to stdout only: {error}",
                    path.display()
                );
                None
            }
        }
    }
}

/// Routes panics from any thread into the sink; the shell keeps running
/// wherever the runtime survives the unwinding task.
pub fn install_panic_logger(sink: Arc<LogSink>) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        sink.append(
            DesktopLogCategory::Runtime,
            &format!("unhandled panic: {info}"),
        );
        previous(info);
    }));
}

pub fn append_desktop_log(message: &str) {
    LogSink::global().append(DesktopLogCategory::Runtime, message);
}

pub fn append_startup_log(message: &str) {
    LogSink::global().append(DesktopLogCategory::Startup, message);
}

pub fn append_restart_log(message: &str) {
    LogSink::global().append(DesktopLogCategory::Restart, message);
}

pub fn append_shutdown_log(message: &str) {
    LogSink::global().append(DesktopLogCategory::Shutdown, message);
}
