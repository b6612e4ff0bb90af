use std::{
    future::Future,
    path::{Path, PathBuf},
};

use url::Url;

use super::PrintOptions;
use crate::window_coordinator::ShellWindow;

/// Content loaded into a hidden window created solely for printing or PDF export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EphemeralContent {
    Html(String),
    Url(Url),
}

/// Native services behind the dialog, print and preview commands.
pub trait PrintHost: Send + Sync + 'static {
    type Window: ShellWindow;

    /// `Ok(None)` when the user cancels the picker.
    fn pick_folder(&self) -> impl Future<Output = Result<Option<PathBuf>, String>> + Send;

    /// The focused window, falling back to the main window.
    fn focused_window(&self) -> Option<Self::Window>;

    /// Creates a hidden window and starts loading `content`.
    fn create_ephemeral_window(&self, content: &EphemeralContent) -> Result<Self::Window, String>;

    fn wait_until_loaded(
        &self,
        window: &Self::Window,
    ) -> impl Future<Output = Result<(), String>> + Send;

    /// Resolves once the native print job has been spooled, cancelled by the
    /// user, or has failed.
    fn print_window(
        &self,
        window: &Self::Window,
        options: &PrintOptions,
    ) -> impl Future<Output = Result<(), String>> + Send;

    /// Renders the window's content to a PDF file at `destination`.
    fn render_pdf(
        &self,
        window: &Self::Window,
        destination: &Path,
    ) -> impl Future<Output = Result<(), String>> + Send;

    fn open_with_default_viewer(&self, path: &Path) -> Result<(), String>;
}
