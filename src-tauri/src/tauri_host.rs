use std::{
    collections::HashMap,
    future::Future,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use schooldesk_shell::{
    ipc::html_data_url, system_open, EphemeralContent, LoadSource, MainWindowTarget,
    OperatorAlerts, PrintHost, PrintOptions, ShellWindow, WindowFactory, MAIN_WINDOW_LABEL,
    PACKAGED_FRONTEND_ENTRY, SPLASH_WINDOW_LABEL,
};
use tauri::{AppHandle, Manager, WebviewUrl, WebviewWindow, WebviewWindowBuilder};
use tauri_plugin_dialog::{DialogExt, MessageDialogKind};
use tokio::sync::oneshot;
use url::Url;

use crate::{append_desktop_log, native_print, pdf_export};

pub(crate) const PRINT_WINDOW_PREFIX: &str = "print-";
const SPLASH_PAGE: &str = "splash.html";

#[cfg(target_os = "windows")]
const PACKAGED_ORIGIN: &str = "http://tauri.localhost/";
#[cfg(not(target_os = "windows"))]
const PACKAGED_ORIGIN: &str = "tauri://localhost/";

#[derive(Clone)]
pub(crate) struct TauriWindow(WebviewWindow);

impl TauriWindow {
    pub(crate) fn inner(&self) -> &WebviewWindow {
        &self.0
    }
}

impl ShellWindow for TauriWindow {
    fn label(&self) -> String {
        self.0.label().to_string()
    }

    fn is_destroyed(&self) -> bool {
        self.0
            .app_handle()
            .get_webview_window(self.0.label())
            .is_none()
    }

    fn show(&self) -> Result<(), String> {
        self.0.show().map_err(|error| error.to_string())
    }

    fn close(&self) -> Result<(), String> {
        self.0.close().map_err(|error| error.to_string())
    }

    fn set_focus(&self) -> Result<(), String> {
        self.0.set_focus().map_err(|error| error.to_string())
    }

    fn is_minimized(&self) -> Result<bool, String> {
        self.0.is_minimized().map_err(|error| error.to_string())
    }

    fn unminimize(&self) -> Result<(), String> {
        self.0.unminimize().map_err(|error| error.to_string())
    }
}

pub(crate) struct TauriWindowFactory {
    app_handle: AppHandle,
}

impl TauriWindowFactory {
    pub(crate) fn new(app_handle: AppHandle) -> Self {
        Self { app_handle }
    }

    fn main_url(&self, target: &MainWindowTarget) -> Result<WebviewUrl, String> {
        match &target.source {
            LoadSource::DevServer(_) => target
                .dev_server_url()
                .map(WebviewUrl::External)
                .ok_or_else(|| "dev server URL unavailable".to_string()),
            LoadSource::Packaged { entry } => {
                if self
                    .app_handle
                    .asset_resolver()
                    .get(entry.clone())
                    .is_none()
                {
                    return Err(format!("bundled frontend is missing {entry}"));
                }
                let entry = target
                    .packaged_entry()
                    .unwrap_or_else(|| PACKAGED_FRONTEND_ENTRY.to_string());
                Url::parse(PACKAGED_ORIGIN)
                    .and_then(|origin| origin.join(&entry))
                    .map(WebviewUrl::CustomProtocol)
                    .map_err(|error| format!("invalid bundled entry {entry}: {error}"))
            }
        }
    }
}

impl WindowFactory for TauriWindowFactory {
    type Window = TauriWindow;

    fn create_splash(&self) -> Result<TauriWindow, String> {
        WebviewWindowBuilder::new(
            &self.app_handle,
            SPLASH_WINDOW_LABEL,
            WebviewUrl::App(PathBuf::from(SPLASH_PAGE)),
        )
        .title("SchoolDesk")
        .inner_size(480.0, 320.0)
        .resizable(false)
        .decorations(false)
        .always_on_top(true)
        .center()
        .visible(true)
        .build()
        .map(TauriWindow)
        .map_err(|error| error.to_string())
    }

    fn create_main(&self, target: &MainWindowTarget) -> Result<TauriWindow, String> {
        let url = self.main_url(target)?;
        WebviewWindowBuilder::new(&self.app_handle, MAIN_WINDOW_LABEL, url)
            .title("SchoolDesk")
            .inner_size(1280.0, 800.0)
            .min_inner_size(960.0, 600.0)
            .center()
            .visible(false)
            .initialization_script(&target.bootstrap_script())
            .build()
            .map(TauriWindow)
            .map_err(|error| error.to_string())
    }
}

/// Error dialogs through the dialog plugin. While one is open the process is
/// kept alive even if no window remains.
pub(crate) struct TauriAlerts {
    app_handle: AppHandle,
    open_dialogs: Arc<AtomicUsize>,
}

impl TauriAlerts {
    pub(crate) fn new(app_handle: AppHandle) -> Self {
        Self {
            app_handle,
            open_dialogs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn has_open_dialog(&self) -> bool {
        self.open_dialogs.load(Ordering::Acquire) > 0
    }
}

impl OperatorAlerts for TauriAlerts {
    fn show_error(&self, title: &str, message: &str) {
        append_desktop_log(&format!("operator dialog: {title}: {message}"));
        self.open_dialogs.fetch_add(1, Ordering::AcqRel);
        let open_dialogs = Arc::clone(&self.open_dialogs);
        let app_handle = self.app_handle.clone();
        self.app_handle
            .dialog()
            .message(message)
            .title(title)
            .kind(MessageDialogKind::Error)
            .show(move |_| {
                let remaining = open_dialogs.fetch_sub(1, Ordering::AcqRel) - 1;
                if remaining == 0 && app_handle.webview_windows().is_empty() {
                    append_desktop_log(
                        "last operator dialog dismissed with no window open; exiting",
                    );
                    app_handle.exit(0);
                }
            });
    }
}

type LoadSignal = oneshot::Sender<Result<(), String>>;

/// Native print, PDF export and folder picking over Tauri webviews.
pub(crate) struct TauriPrintHost {
    app_handle: AppHandle,
    sequence: AtomicU64,
    load_signals: Mutex<HashMap<String, LoadSignal>>,
    load_waiters: Mutex<HashMap<String, oneshot::Receiver<Result<(), String>>>>,
}

impl TauriPrintHost {
    pub(crate) fn new(app_handle: AppHandle) -> Self {
        Self {
            app_handle,
            sequence: AtomicU64::new(0),
            load_signals: Mutex::new(HashMap::new()),
            load_waiters: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn on_page_loaded(&self, label: &str) {
        self.settle(label, Ok(()));
    }

    pub(crate) fn on_window_destroyed(&self, label: &str) {
        self.settle(label, Err("window closed before its content loaded".to_string()));
        if let Ok(mut waiters) = self.load_waiters.lock() {
            waiters.remove(label);
        }
    }

    fn settle(&self, label: &str, outcome: Result<(), String>) {
        let signal = self
            .load_signals
            .lock()
            .ok()
            .and_then(|mut signals| signals.remove(label));
        if let Some(signal) = signal {
            let _ = signal.send(outcome);
        }
    }

    fn forget(&self, label: &str) {
        if let Ok(mut signals) = self.load_signals.lock() {
            signals.remove(label);
        }
        if let Ok(mut waiters) = self.load_waiters.lock() {
            waiters.remove(label);
        }
    }
}

impl PrintHost for TauriPrintHost {
    type Window = TauriWindow;

    fn pick_folder(&self) -> impl Future<Output = Result<Option<PathBuf>, String>> + Send {
        let (sender, receiver) = oneshot::channel();
        self.app_handle.dialog().file().pick_folder(move |folder| {
            let _ = sender.send(folder);
        });
        async move {
            let folder = receiver
                .await
                .map_err(|_| "folder dialog closed unexpectedly".to_string())?;
            folder
                .map(|folder| folder.into_path().map_err(|error| error.to_string()))
                .transpose()
        }
    }

    fn focused_window(&self) -> Option<TauriWindow> {
        let windows = self.app_handle.webview_windows();
        windows
            .values()
            .find(|window| {
                !window.label().starts_with(PRINT_WINDOW_PREFIX)
                    && matches!(window.is_focused(), Ok(true))
            })
            .or_else(|| windows.get(MAIN_WINDOW_LABEL))
            .cloned()
            .map(TauriWindow)
    }

    fn create_ephemeral_window(&self, content: &EphemeralContent) -> Result<TauriWindow, String> {
        let url = match content {
            EphemeralContent::Html(html) => html_data_url(html)?,
            EphemeralContent::Url(url) => url.clone(),
        };
        let label = format!(
            "{PRINT_WINDOW_PREFIX}{}",
            self.sequence.fetch_add(1, Ordering::Relaxed) + 1
        );

        // Registered before the window exists so an early load is not missed.
        let (signal, waiter) = oneshot::channel();
        if let Ok(mut signals) = self.load_signals.lock() {
            signals.insert(label.clone(), signal);
        }
        if let Ok(mut waiters) = self.load_waiters.lock() {
            waiters.insert(label.clone(), waiter);
        }

        WebviewWindowBuilder::new(&self.app_handle, &label, WebviewUrl::External(url))
            .title("SchoolDesk print")
            .inner_size(794.0, 1123.0)
            .visible(false)
            .skip_taskbar(true)
            .build()
            .map(TauriWindow)
            .map_err(|error| {
                self.forget(&label);
                error.to_string()
            })
    }

    fn wait_until_loaded(
        &self,
        window: &TauriWindow,
    ) -> impl Future<Output = Result<(), String>> + Send {
        let label = window.label();
        let waiter = self
            .load_waiters
            .lock()
            .ok()
            .and_then(|mut waiters| waiters.remove(&label));
        async move {
            match waiter {
                Some(waiter) => waiter
                    .await
                    .map_err(|_| format!("load signal for {label} dropped"))?,
                None => Err(format!("no pending load for {label}")),
            }
        }
    }

    fn print_window(
        &self,
        window: &TauriWindow,
        options: &PrintOptions,
    ) -> impl Future<Output = Result<(), String>> + Send {
        append_desktop_log(&format!("printing {} with {options:?}", window.label()));
        native_print::print_webview(window.inner(), options)
    }

    fn render_pdf(
        &self,
        window: &TauriWindow,
        destination: &Path,
    ) -> impl Future<Output = Result<(), String>> + Send {
        pdf_export::render_to_pdf(window.inner(), destination)
    }

    fn open_with_default_viewer(&self, path: &Path) -> Result<(), String> {
        system_open::open_with_system_viewer(path)
    }
}
