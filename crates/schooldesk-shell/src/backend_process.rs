//! Supervision of the backend child process: spawn, output capture, exit
//! monitoring and termination. At most one live child exists at a time.

use std::{
    io::{self, BufRead, BufReader, Read},
    path::PathBuf,
    process::{Child, Command, ExitStatus, Stdio},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    thread,
};

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;

use crate::{
    backend_config::{build_debug_command, LaunchPlan},
    logging::{BackendStream, DesktopLogCategory, LogSink},
    process_control, BACKEND_EXIT_POLL_INTERVAL,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BackendStatus {
    NotStarted,
    Starting,
    Healthy,
    Unhealthy,
    Stopped,
    Crashed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendProcessState {
    pub status: BackendStatus,
    pub pid: Option<u32>,
    pub port: u16,
    pub last_exit_code: Option<i32>,
    pub last_exit_signal: Option<i32>,
    pub started_at: Option<DateTime<Local>>,
}

impl BackendProcessState {
    fn new(port: u16) -> Self {
        Self {
            status: BackendStatus::NotStarted,
            pid: None,
            port,
            last_exit_code: None,
            last_exit_signal: None,
            started_at: None,
        }
    }
}

/// Identifies one spawn. Stopping with a stale handle is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
    pub pid: u32,
    generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    Spawned {
        pid: u32,
    },
    Output {
        stream: BackendStream,
        line: String,
    },
    Exited {
        pid: u32,
        code: Option<i32>,
        signal: Option<i32>,
        expected: bool,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("Backend entry script is missing: {}", .0.display())]
    EntryScriptMissing(PathBuf),
    #[error("Backend process is already running (pid {pid}).")]
    AlreadyRunning { pid: u32 },
    #[error("Failed to spawn backend process with command {command:?}: {source}")]
    Spawn {
        command: Vec<String>,
        #[source]
        source: io::Error,
    },
    #[error("Backend process lock poisoned.")]
    StatePoisoned,
}

type BackendListener = Arc<dyn Fn(&BackendEvent) + Send + Sync>;

struct SupervisedChild {
    child: Child,
    generation: u64,
}

pub struct BackendSupervisor {
    state: Mutex<BackendProcessState>,
    child: Mutex<Option<SupervisedChild>>,
    generation: AtomicU64,
    shutdown_started: AtomicBool,
    listeners: Mutex<Vec<BackendListener>>,
    log: Arc<LogSink>,
}

impl BackendSupervisor {
    pub fn new(port: u16, log: Arc<LogSink>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(BackendProcessState::new(port)),
            child: Mutex::new(None),
            generation: AtomicU64::new(0),
            shutdown_started: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
            log,
        })
    }

    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&BackendEvent) + Send + Sync + 'static,
    {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(Arc::new(listener));
        }
    }

    pub fn state(&self) -> BackendProcessState {
        self.state
            .lock()
            .map(|state| state.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn port(&self) -> u16 {
        self.state().port
    }

    pub fn is_running(&self) -> bool {
        self.child
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    pub fn start(self: &Arc<Self>, plan: &LaunchPlan) -> Result<ProcessHandle, SpawnError> {
        if let Some(entry) = &plan.entry_script {
            if !entry.is_file() {
                let error = SpawnError::EntryScriptMissing(entry.clone());
                self.log.append(DesktopLogCategory::Startup, &error.to_string());
                return Err(error);
            }
        }

        let mut slot = self.child.lock().map_err(|_| SpawnError::StatePoisoned)?;
        if let Some(existing) = slot.as_mut() {
            match existing.child.try_wait() {
                Ok(None) => {
                    return Err(SpawnError::AlreadyRunning {
                        pid: existing.child.id(),
                    })
                }
                // Exited but not yet observed by the monitor; reap it here.
                Ok(Some(_)) | Err(_) => *slot = None,
            }
        }

        self.update_state(|state| {
            state.started_at = Some(Local::now());
            state.port = plan.port;
        });

        let mut command = Command::new(&plan.cmd);
        command
            .args(&plan.args)
            .current_dir(&plan.cwd)
            .envs(plan.env.iter().map(|(key, value)| (key, value)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(process_control::CREATE_NO_WINDOW);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                let error = SpawnError::Spawn {
                    command: build_debug_command(plan),
                    source,
                };
                let message = error.to_string();
                self.log.append(DesktopLogCategory::Startup, &message);
                self.update_state(|state| {
                    state.status = BackendStatus::Crashed;
                    state.pid = None;
                });
                drop(slot);
                self.emit(&BackendEvent::Error { message });
                return Err(error);
            }
        };

        let pid = child.id();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(stdout) = child.stdout.take() {
            self.forward_output(stdout, BackendStream::Stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            self.forward_output(stderr, BackendStream::Stderr);
        }
        *slot = Some(SupervisedChild { child, generation });

        self.update_state(|state| {
            state.status = BackendStatus::Starting;
            state.pid = Some(pid);
            state.last_exit_code = None;
            state.last_exit_signal = None;
        });
        drop(slot);

        self.log.append(
            DesktopLogCategory::Startup,
            &format!(
                "backend process spawned: pid={pid} port={} command={:?}",
                plan.port,
                build_debug_command(plan)
            ),
        );
        self.emit(&BackendEvent::Spawned { pid });
        self.spawn_exit_monitor(generation, pid);

        Ok(ProcessHandle { pid, generation })
    }

    /// Terminates the child identified by `handle`; returns false when that
    /// child is no longer the live one.
    pub fn stop(&self, handle: &ProcessHandle) -> bool {
        self.stop_matching(|supervised| supervised.generation == handle.generation)
    }

    /// Terminates whatever child is live. Safe to call with nothing running.
    pub fn stop_current(&self) -> bool {
        self.stop_matching(|_| true)
    }

    /// Kill attempt issued at most once per supervisor, from the shell's quit hooks.
    pub fn shutdown(&self) -> bool {
        if self.shutdown_started.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.log
            .append(DesktopLogCategory::Shutdown, "stopping backend process");
        self.stop_current()
    }

    pub fn record_health(&self, healthy: bool) {
        self.update_state(|state| {
            if matches!(
                state.status,
                BackendStatus::Starting | BackendStatus::Healthy | BackendStatus::Unhealthy
            ) {
                state.status = if healthy {
                    BackendStatus::Healthy
                } else {
                    BackendStatus::Unhealthy
                };
            }
        });
    }

    fn stop_matching<P>(&self, predicate: P) -> bool
    where
        P: Fn(&SupervisedChild) -> bool,
    {
        let mut slot = match self.child.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !slot.as_ref().is_some_and(&predicate) {
            return false;
        }
        let Some(mut supervised) = slot.take() else {
            return false;
        };

        // The slot stays locked until the old child is reaped so a concurrent
        // start cannot observe two live processes.
        let pid = supervised.child.id();
        let status = match process_control::stop_child_process(&mut supervised.child) {
            Ok(status) => Some(status),
            Err(error) => {
                let message = format!("failed to stop backend process {pid}: {error}");
                self.log.append(DesktopLogCategory::Shutdown, &message);
                self.emit(&BackendEvent::Error { message });
                None
            }
        };
        let (code, signal) = self.record_exit_state(pid, status.as_ref(), true);
        drop(slot);

        self.report_exit(pid, code, signal, true);
        true
    }

    /// Must run while the child slot is still locked, so a `start` racing
    /// with this exit cannot have its fresh state overwritten.
    fn record_exit_state(
        &self,
        pid: u32,
        status: Option<&ExitStatus>,
        expected: bool,
    ) -> (Option<i32>, Option<i32>) {
        let (code, signal) = status
            .map(process_control::exit_code_and_signal)
            .unwrap_or((None, None));
        self.update_state(|state| {
            if state.pid.is_some_and(|current| current != pid) {
                return;
            }
            state.status = if expected {
                BackendStatus::Stopped
            } else {
                BackendStatus::Crashed
            };
            state.pid = None;
            state.last_exit_code = code;
            state.last_exit_signal = signal;
        });
        (code, signal)
    }

    fn report_exit(&self, pid: u32, code: Option<i32>, signal: Option<i32>, expected: bool) {
        let category = if expected {
            DesktopLogCategory::Shutdown
        } else {
            DesktopLogCategory::Runtime
        };
        self.log.append(
            category,
            &format!(
                "backend process {pid} exited with {}{}",
                process_control::describe_exit(code, signal),
                if expected { "" } else { " (unexpected)" }
            ),
        );
        self.emit(&BackendEvent::Exited {
            pid,
            code,
            signal,
            expected,
        });
    }

    fn forward_output<R>(self: &Arc<Self>, reader: R, stream: BackendStream)
    where
        R: Read + Send + 'static,
    {
        let supervisor = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("backend-{stream}"))
            .spawn(move || {
                let mut reader = BufReader::new(reader);
                let mut buffer = Vec::new();
                loop {
                    buffer.clear();
                    match reader.read_until(b'\n', &mut buffer) {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {
                            let line = String::from_utf8_lossy(&buffer);
                            let line = line.trim_end_matches(['\r', '\n']);
                            supervisor.log.append_backend(stream, line);
                            supervisor.emit(&BackendEvent::Output {
                                stream,
                                line: line.to_string(),
                            });
                        }
                    }
                }
            });
        if let Err(error) = spawned {
            self.log.append(
                DesktopLogCategory::Runtime,
                &format!("failed to start backend {stream} forwarder: {error}"),
            );
        }
    }

    fn spawn_exit_monitor(self: &Arc<Self>, generation: u64, pid: u32) {
        let supervisor = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("backend-exit-monitor".to_string())
            .spawn(move || loop {
                thread::sleep(BACKEND_EXIT_POLL_INTERVAL);
                let (exit, poll_error) = {
                    let Ok(mut slot) = supervisor.child.lock() else {
                        return;
                    };
                    let Some(current) = slot.as_mut() else {
                        return;
                    };
                    if current.generation != generation {
                        return;
                    }
                    let polled = match current.child.try_wait() {
                        Ok(None) => continue,
                        Ok(Some(status)) => Ok(status),
                        Err(error) => Err(error),
                    };
                    *slot = None;
                    let exit = supervisor.record_exit_state(pid, polled.as_ref().ok(), false);
                    (exit, polled.err())
                };
                if let Some(error) = poll_error {
                    supervisor.emit(&BackendEvent::Error {
                        message: format!("failed to poll backend process {pid} status: {error}"),
                    });
                }
                let (code, signal) = exit;
                supervisor.report_exit(pid, code, signal, false);
                return;
            });
        if let Err(error) = spawned {
            self.log.append(
                DesktopLogCategory::Runtime,
                &format!("failed to start backend exit monitor: {error}"),
            );
        }
    }

    fn update_state<F>(&self, update: F)
    where
        F: FnOnce(&mut BackendProcessState),
    {
        match self.state.lock() {
            Ok(mut state) => update(&mut state),
            Err(poisoned) => update(&mut poisoned.into_inner()),
        }
    }

    fn emit(&self, event: &BackendEvent) {
        let listeners = match self.listeners.lock() {
            Ok(listeners) => listeners.clone(),
            Err(_) => return,
        };
        for listener in listeners {
            listener(event);
        }
    }
}
