//! In-memory hosts and fixtures shared by the unit tests.

use std::{
    collections::HashMap,
    fs,
    future::Future,
    path::{Path, PathBuf},
    process,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    sync::Notify,
};

use crate::{
    backend_config::ShellConfig,
    backend_process::BackendSupervisor,
    backend_restart::BackendController,
    health_probe::HealthProber,
    ipc::{EphemeralContent, PrintHost, PrintOptions},
    logging::LogSink,
    operator_alerts::OperatorAlerts,
    window_coordinator::{MainWindowTarget, ShellWindow, WindowFactory},
    RunMode, BACKEND_CMD_ENV, BACKEND_PORT_ENV, MAIN_WINDOW_LABEL, RESTART_TIMEOUT_ENV,
    RUN_MODE_ENV, SPLASH_WINDOW_LABEL, STARTUP_TIMEOUT_ENV,
};

pub(crate) fn test_log() -> Arc<LogSink> {
    Arc::new(LogSink::file_only(
        std::env::temp_dir().join(format!("schooldesk-tests-{}.log", process::id())),
    ))
}

pub(crate) fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr").port()
}

/// Answers every request with `200 OK`.
pub(crate) async fn spawn_health_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buffer = [0_u8; 1024];
                let _ = socket.read(&mut buffer).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                    .await;
                let _ = socket.shutdown().await;
            });
        }
    });
    port
}

pub(crate) fn write_sleep_script(dir: &Path) -> PathBuf {
    let script = dir.join("server.sh");
    fs::write(&script, "exec sleep 30\n").expect("write script");
    script
}

/// Configuration resolved from `vars` only, with `dir` as resources, working
/// and user data directory.
pub(crate) fn test_config(dir: &Path, mode: RunMode, vars: &[(&str, String)]) -> ShellConfig {
    let mut lookup: HashMap<String, String> = vars
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect();
    lookup.insert(RUN_MODE_ENV.to_string(), mode.as_env_value().to_string());
    ShellConfig::from_lookup(
        |key| lookup.get(key).cloned(),
        Some(dir),
        dir,
        dir.join("data"),
    )
    .expect("config")
}

/// A controller whose backend is a long-running `sh` script on `port`.
pub(crate) fn test_controller(dir: &Path, mode: RunMode, port: u16) -> BackendController {
    test_controller_with(dir, mode, port, &[])
}

pub(crate) fn test_controller_with(
    dir: &Path,
    mode: RunMode,
    port: u16,
    extra_vars: &[(&str, String)],
) -> BackendController {
    let script = write_sleep_script(dir);
    let mut vars = vec![
        (BACKEND_CMD_ENV, format!("sh '{}'", script.display())),
        (BACKEND_PORT_ENV, port.to_string()),
        (STARTUP_TIMEOUT_ENV, "1000".to_string()),
        (RESTART_TIMEOUT_ENV, "1000".to_string()),
    ];
    vars.extend(extra_vars.iter().cloned());
    let config = test_config(dir, mode, &vars);
    let log = test_log();
    let supervisor = BackendSupervisor::new(config.backend_port, Arc::clone(&log));
    let prober = HealthProber::new(Arc::clone(&log)).expect("prober");
    BackendController::new(&config, supervisor, prober, log)
}

#[derive(Default)]
struct WindowCalls {
    destroyed: AtomicBool,
    minimized: AtomicBool,
    fail_focus: AtomicBool,
    shows: AtomicUsize,
    closes: AtomicUsize,
    focuses: AtomicUsize,
    unminimizes: AtomicUsize,
}

/// Counts every operation; `close` also marks the window destroyed.
#[derive(Clone)]
pub(crate) struct MockWindow {
    label: String,
    calls: Arc<WindowCalls>,
}

impl MockWindow {
    pub(crate) fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            calls: Arc::new(WindowCalls::default()),
        }
    }

    pub(crate) fn shows(&self) -> usize {
        self.calls.shows.load(Ordering::SeqCst)
    }

    pub(crate) fn closes(&self) -> usize {
        self.calls.closes.load(Ordering::SeqCst)
    }

    pub(crate) fn focuses(&self) -> usize {
        self.calls.focuses.load(Ordering::SeqCst)
    }

    pub(crate) fn unminimizes(&self) -> usize {
        self.calls.unminimizes.load(Ordering::SeqCst)
    }

    /// Simulates the user closing the window.
    pub(crate) fn destroy_externally(&self) {
        self.calls.destroyed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn set_minimized(&self, minimized: bool) {
        self.calls.minimized.store(minimized, Ordering::SeqCst);
    }

    pub(crate) fn fail_focus(&self) {
        self.calls.fail_focus.store(true, Ordering::SeqCst);
    }

    fn alive(&self) -> Result<(), String> {
        if self.is_destroyed() {
            Err(format!("window {} is destroyed", self.label))
        } else {
            Ok(())
        }
    }
}

impl ShellWindow for MockWindow {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn is_destroyed(&self) -> bool {
        self.calls.destroyed.load(Ordering::SeqCst)
    }

    fn show(&self) -> Result<(), String> {
        self.alive()?;
        self.calls.shows.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> Result<(), String> {
        self.alive()?;
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
        self.calls.destroyed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn set_focus(&self) -> Result<(), String> {
        self.alive()?;
        self.calls.focuses.fetch_add(1, Ordering::SeqCst);
        if self.calls.fail_focus.load(Ordering::SeqCst) {
            return Err("focus refused by window manager".to_string());
        }
        Ok(())
    }

    fn is_minimized(&self) -> Result<bool, String> {
        self.alive()?;
        Ok(self.calls.minimized.load(Ordering::SeqCst))
    }

    fn unminimize(&self) -> Result<(), String> {
        self.alive()?;
        self.calls.unminimizes.fetch_add(1, Ordering::SeqCst);
        self.calls.minimized.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct FactoryState {
    created: Vec<MockWindow>,
    main_targets: Vec<MainWindowTarget>,
    fail_main: Option<String>,
}

#[derive(Clone, Default)]
pub(crate) struct MockFactory {
    state: Arc<Mutex<FactoryState>>,
}

impl MockFactory {
    /// Most recently created window with `label`.
    pub(crate) fn window(&self, label: &str) -> Option<MockWindow> {
        self.state()
            .created
            .iter()
            .rev()
            .find(|window| window.label == label)
            .cloned()
    }

    pub(crate) fn created_count(&self, label: &str) -> usize {
        self.state()
            .created
            .iter()
            .filter(|window| window.label == label)
            .count()
    }

    pub(crate) fn last_main_target(&self) -> Option<MainWindowTarget> {
        self.state().main_targets.last().cloned()
    }

    pub(crate) fn fail_main_with(&self, reason: &str) {
        self.state().fail_main = Some(reason.to_string());
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FactoryState> {
        self.state.lock().expect("factory state")
    }
}

impl WindowFactory for MockFactory {
    type Window = MockWindow;

    fn create_splash(&self) -> Result<MockWindow, String> {
        let window = MockWindow::new(SPLASH_WINDOW_LABEL);
        self.state().created.push(window.clone());
        Ok(window)
    }

    fn create_main(&self, target: &MainWindowTarget) -> Result<MockWindow, String> {
        let mut state = self.state();
        state.main_targets.push(target.clone());
        if let Some(reason) = state.fail_main.clone() {
            return Err(reason);
        }
        let window = MockWindow::new(MAIN_WINDOW_LABEL);
        state.created.push(window.clone());
        Ok(window)
    }
}

#[derive(Default)]
pub(crate) struct MockAlerts {
    errors: Mutex<Vec<(String, String)>>,
    observed: Mutex<Option<MockFactory>>,
    splash_open_at_alert: Mutex<Vec<bool>>,
}

impl MockAlerts {
    /// Alerts remember whether `factory`'s splash was still open when raised.
    pub(crate) fn observing(factory: &MockFactory) -> Self {
        let alerts = Self::default();
        *alerts.observed.lock().expect("observed") = Some(factory.clone());
        alerts
    }

    pub(crate) fn errors(&self) -> Vec<(String, String)> {
        self.errors.lock().expect("alerts").clone()
    }

    pub(crate) fn splash_open_at_alert(&self) -> Vec<bool> {
        self.splash_open_at_alert.lock().expect("alerts").clone()
    }
}

impl OperatorAlerts for MockAlerts {
    fn show_error(&self, title: &str, message: &str) {
        if let Some(factory) = self.observed.lock().expect("observed").as_ref() {
            let splash_open = factory
                .window(SPLASH_WINDOW_LABEL)
                .is_some_and(|splash| !splash.is_destroyed());
            self.splash_open_at_alert
                .lock()
                .expect("alerts")
                .push(splash_open);
        }
        self.errors
            .lock()
            .expect("alerts")
            .push((title.to_string(), message.to_string()));
    }
}

/// Print host whose ephemeral windows "load" after a short delay and whose
/// PDF export writes a stub document.
#[derive(Default)]
pub(crate) struct MockPrintHost {
    focused: Mutex<Option<MockWindow>>,
    folder: Mutex<Option<PathBuf>>,
    ephemeral: Mutex<Vec<MockWindow>>,
    opened: Mutex<Vec<PathBuf>>,
    fail_load: AtomicBool,
    fail_print: AtomicBool,
    fail_open: AtomicBool,
    printed: AtomicUsize,
    print_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockPrintHost {
    pub(crate) fn focus(&self, window: MockWindow) {
        *self.focused.lock().expect("focused") = Some(window);
    }

    pub(crate) fn choose_folder(&self, path: &str) {
        *self.folder.lock().expect("folder") = Some(PathBuf::from(path));
    }

    pub(crate) fn fail_loads(&self) {
        self.fail_load.store(true, Ordering::SeqCst);
    }

    pub(crate) fn succeed_loads(&self) {
        self.fail_load.store(false, Ordering::SeqCst);
    }

    pub(crate) fn fail_prints(&self) {
        self.fail_print.store(true, Ordering::SeqCst);
    }

    /// Print jobs started after this call only finish once the returned
    /// gate is notified.
    pub(crate) fn hold_prints(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.print_gate.lock().expect("print gate") = Some(Arc::clone(&gate));
        gate
    }

    pub(crate) fn fail_open(&self) {
        self.fail_open.store(true, Ordering::SeqCst);
    }

    pub(crate) fn ephemeral_windows(&self) -> Vec<MockWindow> {
        self.ephemeral.lock().expect("ephemeral").clone()
    }

    pub(crate) fn opened(&self) -> Vec<PathBuf> {
        self.opened.lock().expect("opened").clone()
    }

    pub(crate) fn printed(&self) -> usize {
        self.printed.load(Ordering::SeqCst)
    }
}

impl PrintHost for MockPrintHost {
    type Window = MockWindow;

    fn pick_folder(&self) -> impl Future<Output = Result<Option<PathBuf>, String>> + Send {
        let folder = self.folder.lock().expect("folder").clone();
        async move { Ok(folder) }
    }

    fn focused_window(&self) -> Option<MockWindow> {
        self.focused.lock().expect("focused").clone()
    }

    fn create_ephemeral_window(&self, _content: &EphemeralContent) -> Result<MockWindow, String> {
        let mut ephemeral = self.ephemeral.lock().expect("ephemeral");
        let window = MockWindow::new(&format!("print-{}", ephemeral.len() + 1));
        ephemeral.push(window.clone());
        Ok(window)
    }

    fn wait_until_loaded(
        &self,
        window: &MockWindow,
    ) -> impl Future<Output = Result<(), String>> + Send {
        let fail = self.fail_load.load(Ordering::SeqCst);
        let label = window.label();
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if fail {
                Err(format!("{label}: net::ERR_CONNECTION_REFUSED"))
            } else {
                Ok(())
            }
        }
    }

    fn print_window(
        &self,
        _window: &MockWindow,
        _options: &PrintOptions,
    ) -> impl Future<Output = Result<(), String>> + Send {
        let fail = self.fail_print.load(Ordering::SeqCst);
        if !fail {
            self.printed.fetch_add(1, Ordering::SeqCst);
        }
        let gate = self.print_gate.lock().expect("print gate").clone();
        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if fail {
                Err("printer offline".to_string())
            } else {
                Ok(())
            }
        }
    }

    fn render_pdf(
        &self,
        _window: &MockWindow,
        destination: &Path,
    ) -> impl Future<Output = Result<(), String>> + Send {
        let destination = destination.to_path_buf();
        async move {
            tokio::fs::write(&destination, b"%PDF-1.4 mock")
                .await
                .map_err(|error| error.to_string())
        }
    }

    fn open_with_default_viewer(&self, path: &Path) -> Result<(), String> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err("no viewer registered for PDF".to_string());
        }
        self.opened.lock().expect("opened").push(path.to_path_buf());
        Ok(())
    }
}
