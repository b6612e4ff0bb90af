use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use serde_json::Value;

use super::{
    decode_pdf_payload, parse_print_url, preview_file_path, BridgeResult, EphemeralContent,
    EphemeralWindow, IpcCommand, PrintHost, PrintOptions,
};
use crate::{
    backend_restart::{BackendController, RestartOutcome},
    logging::{DesktopLogCategory, LogSink},
    window_coordinator::{WindowCoordinator, WindowFactory},
    EPHEMERAL_LOAD_TIMEOUT,
};

/// Handlers behind the renderer's command catalogue. Every handler converts
/// its failures into a `BridgeResult`; none of them can take the shell down.
pub struct IpcGateway<F: WindowFactory, P: PrintHost> {
    windows: Arc<WindowCoordinator<F>>,
    backend: Arc<BackendController>,
    host: Arc<P>,
    preview_dir: PathBuf,
    log: Arc<LogSink>,
}

impl<F: WindowFactory, P: PrintHost> IpcGateway<F, P> {
    pub fn new(
        windows: Arc<WindowCoordinator<F>>,
        backend: Arc<BackendController>,
        host: Arc<P>,
        preview_dir: PathBuf,
        log: Arc<LogSink>,
    ) -> Self {
        Self {
            windows,
            backend,
            host,
            preview_dir,
            log,
        }
    }

    pub fn preview_dir(&self) -> &Path {
        &self.preview_dir
    }

    pub async fn dispatch(&self, command: IpcCommand) -> BridgeResult<Value> {
        let name = command.name();
        let result = match command {
            IpcCommand::FolderDialog => self.open_folder_dialog().await.into_json(),
            IpcCommand::CloseSplash => self.close_splash().into_json(),
            IpcCommand::GetBackendBase => self.get_backend_base().into_json(),
            IpcCommand::RestartBackend => self.restart_backend().await.into_json(),
            IpcCommand::PrintCurrent { options } => self.print_current(&options).await.into_json(),
            IpcCommand::PrintHtml { html, options } => {
                self.print_html(html, &options).await.into_json()
            }
            IpcCommand::PrintUrl { url, options } => {
                self.print_url(&url, &options).await.into_json()
            }
            IpcCommand::PreviewCurrent => self.preview_current().await.into_json(),
            IpcCommand::PreviewHtml { html } => self.preview_html(html).await.into_json(),
            IpcCommand::PreviewPdf { data } => self.preview_pdf(&data).await.into_json(),
        };
        if let Some(reason) = result.reason.as_deref().filter(|_| !result.ok) {
            self.log(&format!("{name} failed: {reason}"));
        }
        result
    }

    /// Chosen directory, or an empty success when the picker was cancelled.
    pub async fn open_folder_dialog(&self) -> BridgeResult<String> {
        match self.host.pick_folder().await {
            Ok(Some(path)) => BridgeResult::success(path.to_string_lossy().to_string()),
            Ok(None) => BridgeResult::empty(),
            Err(error) => BridgeResult::failure(format!("Failed to open folder dialog: {error}")),
        }
    }

    pub fn close_splash(&self) -> BridgeResult<()> {
        self.windows.on_splash_ready();
        BridgeResult::empty()
    }

    pub fn get_backend_base(&self) -> BridgeResult<String> {
        BridgeResult::success(self.backend.base_url())
    }

    /// Always carries the base URL; a failed post-restart health check only
    /// adds a `reason` so the renderer can re-probe through its own calls.
    pub async fn restart_backend(&self) -> BridgeResult<String> {
        match self.backend.restart().await {
            RestartOutcome::Skipped { base_url } => BridgeResult::success(base_url),
            RestartOutcome::Completed {
                base_url,
                healthy: true,
            } => BridgeResult::success(base_url),
            RestartOutcome::Completed {
                base_url,
                healthy: false,
            } => BridgeResult {
                ok: true,
                value: Some(base_url),
                reason: Some("Backend restarted but has not reported healthy yet.".to_string()),
            },
            RestartOutcome::Rejected { base_url } => {
                BridgeResult::failure_with(base_url, "Backend restart already in progress.")
            }
            RestartOutcome::Failed { base_url, error } => {
                BridgeResult::failure_with(base_url, format!("Backend restart failed: {error}"))
            }
        }
    }

    pub async fn print_current(&self, options: &PrintOptions) -> BridgeResult<()> {
        let Some(window) = self.host.focused_window() else {
            return BridgeResult::failure("No window available to print.");
        };
        match self.host.print_window(&window, options).await {
            Ok(()) => BridgeResult::empty(),
            Err(error) => BridgeResult::failure(format!("Print failed: {error}")),
        }
    }

    pub async fn print_html(&self, html: String, options: &PrintOptions) -> BridgeResult<()> {
        self.print_ephemeral(EphemeralContent::Html(html), options)
            .await
    }

    pub async fn print_url(&self, raw_url: &str, options: &PrintOptions) -> BridgeResult<()> {
        match parse_print_url(raw_url) {
            Ok(url) => self.print_ephemeral(EphemeralContent::Url(url), options).await,
            Err(error) => BridgeResult::failure(error),
        }
    }

    pub async fn preview_current(&self) -> BridgeResult<String> {
        let Some(window) = self.host.focused_window() else {
            return BridgeResult::failure("No window available to preview.");
        };
        let destination = match self.prepare_preview_path().await {
            Ok(destination) => destination,
            Err(error) => return BridgeResult::failure(error),
        };
        if let Err(error) = self.host.render_pdf(&window, &destination).await {
            return BridgeResult::failure(format!("PDF export failed: {error}"));
        }
        self.open_preview(destination)
    }

    pub async fn preview_html(&self, html: String) -> BridgeResult<String> {
        let destination = match self.prepare_preview_path().await {
            Ok(destination) => destination,
            Err(error) => return BridgeResult::failure(error),
        };
        let rendered = {
            let window = match self.load_ephemeral(&EphemeralContent::Html(html)).await {
                Ok(window) => window,
                Err(error) => return BridgeResult::failure(error),
            };
            self.host.render_pdf(window.window(), &destination).await
        };
        if let Err(error) = rendered {
            return BridgeResult::failure(format!("PDF export failed: {error}"));
        }
        self.open_preview(destination)
    }

    pub async fn preview_pdf(&self, data: &str) -> BridgeResult<String> {
        let bytes = match decode_pdf_payload(data) {
            Ok(bytes) => bytes,
            Err(error) => return BridgeResult::failure(error.to_string()),
        };
        let destination = match self.prepare_preview_path().await {
            Ok(destination) => destination,
            Err(error) => return BridgeResult::failure(error),
        };
        if let Err(error) = tokio::fs::write(&destination, &bytes).await {
            return BridgeResult::failure(format!(
                "Failed to write {}: {error}",
                destination.display()
            ));
        }
        self.open_preview(destination)
    }

    async fn print_ephemeral(
        &self,
        content: EphemeralContent,
        options: &PrintOptions,
    ) -> BridgeResult<()> {
        let window = match self.load_ephemeral(&content).await {
            Ok(window) => window,
            Err(error) => return BridgeResult::failure(error),
        };
        match self.host.print_window(window.window(), options).await {
            Ok(()) => BridgeResult::empty(),
            Err(error) => BridgeResult::failure(format!("Print failed: {error}")),
        }
    }

    /// Creates a hidden window for `content` and waits for it to load. The
    /// returned guard closes the window when dropped, on every exit path.
    async fn load_ephemeral(
        &self,
        content: &EphemeralContent,
    ) -> Result<EphemeralWindow<P::Window>, String> {
        let window = self
            .host
            .create_ephemeral_window(content)
            .map_err(|error| format!("Failed to create print window: {error}"))?;
        let window = EphemeralWindow::new(window, Arc::clone(&self.log));

        let loaded = self.host.wait_until_loaded(window.window());
        match tokio::time::timeout(EPHEMERAL_LOAD_TIMEOUT, loaded).await {
            Ok(Ok(())) => Ok(window),
            Ok(Err(error)) => Err(format!("Print content failed to load: {error}")),
            Err(_) => Err(format!(
                "Print content did not load within {}s.",
                EPHEMERAL_LOAD_TIMEOUT.as_secs()
            )),
        }
    }

    async fn prepare_preview_path(&self) -> Result<PathBuf, String> {
        tokio::fs::create_dir_all(&self.preview_dir)
            .await
            .map_err(|error| {
                format!(
                    "Failed to create preview directory {}: {error}",
                    self.preview_dir.display()
                )
            })?;
        Ok(preview_file_path(&self.preview_dir))
    }

    /// The PDF stays on disk even when no viewer could be launched, so the
    /// path is reported either way.
    fn open_preview(&self, destination: PathBuf) -> BridgeResult<String> {
        let path = destination.to_string_lossy().to_string();
        match self.host.open_with_default_viewer(&destination) {
            Ok(()) => BridgeResult::success(path),
            Err(error) => {
                BridgeResult::failure_with(path, format!("Failed to open preview: {error}"))
            }
        }
    }

    fn log(&self, message: &str) {
        self.log.append(DesktopLogCategory::Ipc, message);
    }
}
