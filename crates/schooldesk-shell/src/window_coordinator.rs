//! Splash/main window handoff.
//!
//! The main window is shown once both the splash has reported completion (or
//! the shell runs in development mode, which has no splash) and the main
//! window has finished its initial load. The two signals may arrive in either
//! order; whichever comes second performs the transition, exactly once.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use url::Url;

use crate::{
    backend_config::LoadSource,
    logging::{DesktopLogCategory, LogSink},
    operator_alerts::{self, OperatorAlerts},
    RunMode, BACKEND_PORT_QUERY_KEY, MAIN_WINDOW_LABEL, SPLASH_WINDOW_LABEL,
};

/// A native window as seen by the coordinator and the print gateway. Every
/// operation may fail once the user has closed the window.
pub trait ShellWindow: Clone + Send + Sync + 'static {
    fn label(&self) -> String;
    fn is_destroyed(&self) -> bool;
    fn show(&self) -> Result<(), String>;
    fn close(&self) -> Result<(), String>;
    fn set_focus(&self) -> Result<(), String>;
    fn is_minimized(&self) -> Result<bool, String>;
    fn unminimize(&self) -> Result<(), String>;
}

pub trait WindowFactory: Send + Sync + 'static {
    type Window: ShellWindow;

    fn create_splash(&self) -> Result<Self::Window, String>;
    /// Creates the main window hidden, loading `target`.
    fn create_main(&self, target: &MainWindowTarget) -> Result<Self::Window, String>;
}

/// Load target of the main window plus the backend port handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainWindowTarget {
    pub source: LoadSource,
    pub backend_port: u16,
}

impl MainWindowTarget {
    pub fn new(source: LoadSource, backend_port: u16) -> Self {
        Self {
            source,
            backend_port,
        }
    }

    /// Dev server URL with the backend port appended as a query parameter.
    pub fn dev_server_url(&self) -> Option<Url> {
        let LoadSource::DevServer(url) = &self.source else {
            return None;
        };
        let mut url = url.clone();
        url.query_pairs_mut()
            .append_pair(BACKEND_PORT_QUERY_KEY, &self.backend_port.to_string());
        Some(url)
    }

    /// Bundled entry path with the backend port as a query parameter.
    pub fn packaged_entry(&self) -> Option<String> {
        let LoadSource::Packaged { entry } = &self.source else {
            return None;
        };
        Some(format!(
            "{entry}?{BACKEND_PORT_QUERY_KEY}={}",
            self.backend_port
        ))
    }

    /// Script evaluated before any renderer code, exposing the port out of band.
    pub fn bootstrap_script(&self) -> String {
        format!(
            "window.__SCHOOLDESK_BACKEND_PORT__ = {};",
            self.backend_port
        )
    }

    pub fn describe(&self) -> String {
        match &self.source {
            LoadSource::DevServer(url) => url.to_string(),
            LoadSource::Packaged { entry } => format!("bundled {entry}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WindowPhase {
    SplashOnly,
    Transitioning,
    MainOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplashState {
    pub exists: bool,
    pub closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MainState {
    pub exists: bool,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowState {
    pub splash: SplashState,
    pub main: MainState,
}

struct WindowSlots<W> {
    phase: WindowPhase,
    splash: Option<W>,
    main: Option<W>,
    splash_closed: bool,
    splash_ready: bool,
    main_loaded: bool,
    main_visible: bool,
    last_target: Option<MainWindowTarget>,
}

pub struct WindowCoordinator<F: WindowFactory> {
    mode: RunMode,
    factory: F,
    alerts: Arc<dyn OperatorAlerts>,
    log: Arc<LogSink>,
    slots: Mutex<WindowSlots<F::Window>>,
}

impl<F: WindowFactory> WindowCoordinator<F> {
    pub fn new(
        mode: RunMode,
        factory: F,
        alerts: Arc<dyn OperatorAlerts>,
        log: Arc<LogSink>,
    ) -> Self {
        let phase = if mode.is_development() {
            WindowPhase::MainOnly
        } else {
            WindowPhase::SplashOnly
        };
        Self {
            mode,
            factory,
            alerts,
            log,
            slots: Mutex::new(WindowSlots {
                phase,
                splash: None,
                main: None,
                splash_closed: false,
                splash_ready: false,
                main_loaded: false,
                main_visible: false,
                last_target: None,
            }),
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn phase(&self) -> WindowPhase {
        self.slots().phase
    }

    pub fn window_state(&self) -> WindowState {
        let slots = self.slots();
        WindowState {
            splash: SplashState {
                exists: live(&slots.splash).is_some(),
                closed: slots.splash_closed,
            },
            main: MainState {
                exists: live(&slots.main).is_some(),
                visible: slots.main_visible,
            },
        }
    }

    pub fn main_window(&self) -> Option<F::Window> {
        live(&self.slots().main)
    }

    pub fn create_splash(&self) -> Result<(), String> {
        if self.mode.is_development() {
            return Ok(());
        }
        if live(&self.slots().splash).is_some() {
            return Ok(());
        }

        let splash = self.factory.create_splash().map_err(|error| {
            self.log(&format!("failed to create splash window: {error}"));
            error
        })?;
        self.slots().splash = Some(splash);
        self.log("splash window created");
        Ok(())
    }

    /// Creates the main window once per run. A creation failure is surfaced
    /// to the operator instead of leaving a blank window behind.
    pub fn create_main(&self, target: MainWindowTarget) -> Result<(), String> {
        if live(&self.slots().main).is_some() {
            return Ok(());
        }

        match self.factory.create_main(&target) {
            Ok(window) => {
                let mut slots = self.slots();
                slots.main = Some(window);
                slots.main_loaded = false;
                slots.main_visible = false;
                slots.last_target = Some(target.clone());
                drop(slots);
                self.log(&format!("main window created for {}", target.describe()));
                Ok(())
            }
            Err(error) => {
                self.slots().last_target = Some(target.clone());
                self.on_main_load_failed(&target.describe(), &error);
                Err(error)
            }
        }
    }

    pub fn on_splash_ready(&self) {
        {
            let mut slots = self.slots();
            if slots.splash_ready {
                return;
            }
            slots.splash_ready = true;
        }
        self.log("splash reported ready");
        self.advance();
    }

    pub fn on_main_content_loaded(&self) {
        {
            let mut slots = self.slots();
            if live(&slots.main).is_none() || slots.main_loaded {
                return;
            }
            slots.main_loaded = true;
        }
        self.log("main window content loaded");
        self.advance();
    }

    pub fn on_main_load_failed(&self, target: &str, reason: &str) {
        self.log(&format!("main window failed to load {target}: {reason}"));
        // Alert first: the splash may be the last open window.
        self.alerts.show_error(
            operator_alerts::FRONTEND_LOAD_FAILED_TITLE,
            &operator_alerts::frontend_load_failed_message(
                target,
                reason,
                &self.log.describe_location(),
            ),
        );
        self.close_splash_now();
    }

    /// Drops the reference to a window the user or the OS has closed.
    pub fn on_window_destroyed(&self, label: &str) {
        let mut slots = self.slots();
        if label == SPLASH_WINDOW_LABEL {
            if slots.splash.take().is_some() {
                slots.splash_closed = true;
            }
        } else if label == MAIN_WINDOW_LABEL && slots.main.take().is_some() {
            slots.main_loaded = false;
            slots.main_visible = false;
        }
    }

    /// Closes the splash regardless of readiness; used on fatal startup paths.
    pub fn close_splash_now(&self) {
        let splash = {
            let mut slots = self.slots();
            let splash = slots.splash.take();
            if splash.is_some() {
                slots.splash_closed = true;
            }
            splash
        };
        if let Some(splash) = splash {
            self.close_window(&splash);
        }
    }

    /// Brings the running instance to the foreground. Failures are swallowed.
    pub fn focus_main(&self) -> bool {
        let (target, main_visible) = {
            let slots = self.slots();
            let target = if slots.main_visible {
                live(&slots.main)
            } else {
                live(&slots.splash).or_else(|| live(&slots.main))
            };
            (target, slots.main_visible)
        };
        let Some(window) = target else {
            self.log("focus request ignored: no open window");
            return false;
        };

        if let Ok(true) = window.is_minimized() {
            if let Err(error) = window.unminimize() {
                self.log(&format!("failed to restore {}: {error}", window.label()));
            }
        }
        if main_visible {
            if let Err(error) = window.show() {
                self.log(&format!("failed to show {}: {error}", window.label()));
            }
        }
        if let Err(error) = window.set_focus() {
            self.log(&format!("failed to focus {}: {error}", window.label()));
        }
        true
    }

    /// Re-activation with no open window (macOS dock click) recreates the
    /// main window; it is shown as soon as it has loaded.
    pub fn reactivate(&self) {
        let target = {
            let mut slots = self.slots();
            if live(&slots.main).is_some() {
                None
            } else {
                slots.splash_ready = true;
                slots.phase = WindowPhase::Transitioning;
                slots.last_target.clone()
            }
        };
        match target {
            None => {
                self.focus_main();
            }
            Some(target) => {
                let _ = self.create_main(target);
            }
        }
    }

    fn advance(&self) {
        let (main, splash) = {
            let mut slots = self.slots();
            let splash_gate = slots.splash_ready || self.mode.is_development();
            if !splash_gate || !slots.main_loaded || slots.main_visible {
                return;
            }
            let Some(main) = live(&slots.main) else {
                slots.main = None;
                return;
            };
            slots.phase = WindowPhase::Transitioning;
            slots.main_visible = true;
            let splash = slots.splash.take();
            if splash.is_some() {
                slots.splash_closed = true;
            }
            (main, splash)
        };

        if let Err(error) = main.show() {
            self.log(&format!("failed to show main window: {error}"));
        }
        if let Err(error) = main.set_focus() {
            self.log(&format!("failed to focus main window: {error}"));
        }
        if let Some(splash) = splash {
            self.close_window(&splash);
        }

        self.slots().phase = WindowPhase::MainOnly;
        self.log("main window shown");
    }

    fn close_window(&self, window: &F::Window) {
        if window.is_destroyed() {
            return;
        }
        if let Err(error) = window.close() {
            self.log(&format!("failed to close {}: {error}", window.label()));
        }
    }

    fn slots(&self) -> MutexGuard<'_, WindowSlots<F::Window>> {
        match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn log(&self, message: &str) {
        self.log.append(DesktopLogCategory::Window, message);
    }
}

fn live<W: ShellWindow>(slot: &Option<W>) -> Option<W> {
    slot.as_ref().filter(|window| !window.is_destroyed()).cloned()
}
