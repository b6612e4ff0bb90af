//! The closed catalogue of commands the renderer may issue to the shell.

mod gateway;
mod host;
mod print_jobs;

use serde::{Deserialize, Serialize};

pub use gateway::IpcGateway;
pub use host::{EphemeralContent, PrintHost};
pub use print_jobs::{
    decode_pdf_payload, html_data_url, parse_print_url, preview_file_path, EphemeralWindow,
    PdfSourceError, PrintOptions,
};

/// Typed reply to every command; failures never escape as raw errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeResult<T> {
    pub ok: bool,
    pub value: Option<T>,
    pub reason: Option<String>,
}

impl<T> BridgeResult<T> {
    pub fn success(value: T) -> Self {
        Self {
            ok: true,
            value: Some(value),
            reason: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            ok: true,
            value: None,
            reason: None,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            value: None,
            reason: Some(reason.into()),
        }
    }

    pub fn failure_with(value: T, reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            value: Some(value),
            reason: Some(reason.into()),
        }
    }
}

impl<T: Serialize> BridgeResult<T> {
    pub fn into_json(self) -> BridgeResult<serde_json::Value> {
        let value = self
            .value
            .and_then(|value| serde_json::to_value(value).ok());
        BridgeResult {
            ok: self.ok,
            value,
            reason: self.reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", content = "payload", rename_all = "kebab-case")]
pub enum IpcCommand {
    FolderDialog,
    CloseSplash,
    GetBackendBase,
    RestartBackend,
    PrintCurrent {
        #[serde(default)]
        options: PrintOptions,
    },
    PrintHtml {
        html: String,
        #[serde(default)]
        options: PrintOptions,
    },
    PrintUrl {
        url: String,
        #[serde(default)]
        options: PrintOptions,
    },
    PreviewCurrent,
    PreviewHtml {
        html: String,
    },
    PreviewPdf {
        data: String,
    },
}

impl IpcCommand {
    pub const NAMES: [&'static str; 10] = [
        "folder-dialog",
        "close-splash",
        "get-backend-base",
        "restart-backend",
        "print-current",
        "print-html",
        "print-url",
        "preview-current",
        "preview-html",
        "preview-pdf",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::FolderDialog => "folder-dialog",
            Self::CloseSplash => "close-splash",
            Self::GetBackendBase => "get-backend-base",
            Self::RestartBackend => "restart-backend",
            Self::PrintCurrent { .. } => "print-current",
            Self::PrintHtml { .. } => "print-html",
            Self::PrintUrl { .. } => "print-url",
            Self::PreviewCurrent => "preview-current",
            Self::PreviewHtml { .. } => "preview-html",
            Self::PreviewPdf { .. } => "preview-pdf",
        }
    }
}
