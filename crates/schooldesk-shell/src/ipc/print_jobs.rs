use std::{
    path::{Path, PathBuf},
    process,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Local;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::{
    logging::{DesktopLogCategory, LogSink},
    window_coordinator::ShellWindow,
    PREVIEW_FILE_PREFIX,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrintOptions {
    pub silent: bool,
    pub print_background: bool,
    pub device_name: Option<String>,
    pub landscape: bool,
    pub copies: Option<u32>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PdfSourceError {
    #[error("PDF payload is empty.")]
    Empty,
    #[error("PDF data URL must be base64 encoded.")]
    NotBase64DataUrl,
    #[error("PDF payload is not valid base64: {0}")]
    InvalidBase64(String),
}

/// A window created for a single print or preview job. It is closed exactly
/// once when the guard goes out of scope, whichever way the job ended.
pub struct EphemeralWindow<W: ShellWindow> {
    window: W,
    log: Arc<LogSink>,
}

impl<W: ShellWindow> EphemeralWindow<W> {
    pub fn new(window: W, log: Arc<LogSink>) -> Self {
        Self { window, log }
    }

    pub fn window(&self) -> &W {
        &self.window
    }
}

impl<W: ShellWindow> Drop for EphemeralWindow<W> {
    fn drop(&mut self) {
        if self.window.is_destroyed() {
            return;
        }
        if let Err(error) = self.window.close() {
            self.log.append(
                DesktopLogCategory::Ipc,
                &format!(
                    "failed to close ephemeral window {}: {error}",
                    self.window.label()
                ),
            );
        }
    }
}

static PREVIEW_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Timestamp-qualified preview path, unique across concurrent requests.
pub fn preview_file_path(dir: &Path) -> PathBuf {
    let sequence = PREVIEW_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    dir.join(format!(
        "{PREVIEW_FILE_PREFIX}-{}-{}-{sequence}.pdf",
        Local::now().format("%Y%m%d-%H%M%S%.3f"),
        process::id()
    ))
}

/// Accepts raw base64 or a `data:application/pdf;base64,` URL.
pub fn decode_pdf_payload(raw: &str) -> Result<Vec<u8>, PdfSourceError> {
    let trimmed = raw.trim();
    let encoded = match trimmed.strip_prefix("data:") {
        Some(data_url) => {
            let (header, body) = data_url
                .split_once(',')
                .ok_or(PdfSourceError::NotBase64DataUrl)?;
            if !header.ends_with(";base64") {
                return Err(PdfSourceError::NotBase64DataUrl);
            }
            body
        }
        None => trimmed,
    };

    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(PdfSourceError::Empty);
    }
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|error| PdfSourceError::InvalidBase64(error.to_string()))?;
    if bytes.is_empty() {
        return Err(PdfSourceError::Empty);
    }
    Ok(bytes)
}

pub fn parse_print_url(raw_url: &str) -> Result<Url, String> {
    let trimmed = raw_url.trim();
    if trimmed.is_empty() {
        return Err("Missing URL to print.".to_string());
    }

    let parsed = Url::parse(trimmed).map_err(|error| format!("Invalid URL: {error}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(format!(
            "Unsupported URL scheme '{scheme}', only http/https are allowed."
        )),
    }
}

/// Inline document URL for rendering caller-supplied HTML in a hidden window.
pub fn html_data_url(html: &str) -> Result<Url, String> {
    Url::parse(&format!(
        "data:text/html;charset=utf-8;base64,{}",
        STANDARD.encode(html.as_bytes())
    ))
    .map_err(|error| format!("Failed to build HTML document URL: {error}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::test_support::{test_log, MockWindow};

    #[test]
    fn preview_paths_are_unique_and_timestamped() {
        let dir = PathBuf::from("/tmp/previews");
        let paths: HashSet<_> = (0..64).map(|_| preview_file_path(&dir)).collect();
        assert_eq!(paths.len(), 64);
        let name = paths
            .iter()
            .next()
            .and_then(|path| path.file_name())
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        assert!(name.starts_with("schooldesk-preview-"));
        assert!(name.ends_with(".pdf"));
    }

    #[test]
    fn decodes_raw_base64_and_data_urls() {
        let encoded = STANDARD.encode(b"%PDF-1.7 body");
        assert_eq!(decode_pdf_payload(&encoded).expect("raw"), b"%PDF-1.7 body");
        assert_eq!(
            decode_pdf_payload(&format!("data:application/pdf;base64,{encoded}"))
                .expect("data url"),
            b"%PDF-1.7 body"
        );
        let wrapped = format!("{}\n{}", &encoded[..8], &encoded[8..]);
        assert_eq!(decode_pdf_payload(&wrapped).expect("wrapped"), b"%PDF-1.7 body");
    }

    #[test]
    fn rejects_empty_and_non_base64_payloads() {
        assert_eq!(decode_pdf_payload("  "), Err(PdfSourceError::Empty));
        assert_eq!(
            decode_pdf_payload("data:application/pdf,%25PDF"),
            Err(PdfSourceError::NotBase64DataUrl)
        );
        assert!(matches!(
            decode_pdf_payload("not base64!"),
            Err(PdfSourceError::InvalidBase64(_))
        ));
    }

    #[test]
    fn print_urls_are_limited_to_http() {
        assert!(parse_print_url("https://school.example/report").is_ok());
        assert!(parse_print_url("javascript:alert(1)").is_err());
        assert!(parse_print_url("file:///etc/passwd").is_err());
        assert!(parse_print_url("").is_err());
    }

    #[test]
    fn html_is_carried_as_opaque_base64() {
        let url = html_data_url("<script>alert(1)</script>").expect("url");
        assert_eq!(url.scheme(), "data");
        assert!(!url.as_str().contains("<script>"));
    }

    #[test]
    fn ephemeral_window_closes_once_on_drop() {
        let window = MockWindow::new("print-1");
        {
            let guard = EphemeralWindow::new(window.clone(), test_log());
            assert_eq!(guard.window().label(), "print-1");
        }
        assert_eq!(window.closes(), 1);
    }

    #[test]
    fn ephemeral_window_skips_already_destroyed_window() {
        let window = MockWindow::new("print-2");
        window.destroy_externally();
        drop(EphemeralWindow::new(window.clone(), test_log()));
        assert_eq!(window.closes(), 0);
    }
}
