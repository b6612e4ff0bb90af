//! Rendering a webview's current document to a PDF file.

use std::{future::Future, path::Path};

use tauri::WebviewWindow;

use crate::webview_job::{run_on_webview, JobSlot};

/// WebKitGTK prints straight to a file through the "Print to File" backend.
#[cfg(target_os = "linux")]
pub(crate) fn render_to_pdf(
    window: &WebviewWindow,
    destination: &Path,
) -> impl Future<Output = Result<(), String>> + Send {
    use url::Url;
    use webkit2gtk::{PrintOperation, PrintOperationExt};

    let output_uri = Url::from_file_path(destination)
        .map(|uri| uri.to_string())
        .map_err(|_| format!("PDF destination is not absolute: {}", destination.display()));

    run_on_webview(window, move |webview, sender| {
        let slot = JobSlot::new(sender);
        let output_uri = match output_uri {
            Ok(output_uri) => output_uri,
            Err(error) => return slot.finish(Err(error)),
        };

        let settings = gtk::PrintSettings::new();
        settings.set("output-uri", Some(output_uri.as_str()));
        settings.set("output-file-format", Some("pdf"));
        settings.set_printer("Print to File");

        let operation = PrintOperation::new(&webview.inner());
        operation.set_print_settings(&settings);
        operation.set_page_setup(&gtk::PageSetup::new());
        crate::webview_job::track_print_operation(&operation, &slot);
        operation.print();
    })
}

/// WKWebView `createPDF` hands back the document bytes.
#[cfg(target_os = "macos")]
pub(crate) fn render_to_pdf(
    window: &WebviewWindow,
    destination: &Path,
) -> impl Future<Output = Result<(), String>> + Send {
    use std::ptr;

    use block2::RcBlock;
    use objc2::{msg_send, runtime::AnyObject};
    use objc2_foundation::{NSData, NSError};

    let rendered = run_on_webview(window, |webview, sender| {
        let slot = JobSlot::new(sender);
        let view = webview.inner().cast::<AnyObject>();
        let completion = RcBlock::new(move |data: *mut NSData, error: *mut NSError| {
            // SAFETY: WebKit passes either a live NSData or a live NSError
            // for the duration of the callback.
            let outcome = match unsafe { (data.as_ref(), error.as_ref()) } {
                (Some(data), _) => Ok(data.to_vec()),
                (None, Some(error)) => Err(error.localizedDescription().to_string()),
                (None, None) => Err("WebKit returned no PDF data".to_string()),
            };
            slot.finish(outcome);
        });
        // SAFETY: `view` is the WKWebView backing this window and we are on
        // the main thread; WebKit copies the completion block.
        unsafe {
            let _: () = msg_send![
                view,
                createPDFWithConfiguration: ptr::null_mut::<AnyObject>(),
                completionHandler: &*completion
            ];
        }
    });

    write_rendered(rendered, destination)
}

/// WebView2 `PrintToPdf` writes the file itself.
#[cfg(target_os = "windows")]
pub(crate) fn render_to_pdf(
    window: &WebviewWindow,
    destination: &Path,
) -> impl Future<Output = Result<(), String>> + Send {
    use webview2_com::{
        Microsoft::Web::WebView2::Win32::{ICoreWebView2PrintSettings, ICoreWebView2_7},
        PrintToPdfCompletedHandler,
    };
    use windows::core::{Interface, HSTRING};

    let output_path = HSTRING::from(destination);
    run_on_webview(window, move |webview, sender| {
        let slot = JobSlot::new(sender);
        let on_completed = slot.clone();
        let handler = PrintToPdfCompletedHandler::create(Box::new(move |result, succeeded| {
            on_completed.finish(match result {
                Err(error) => Err(error.to_string()),
                Ok(()) if succeeded.as_bool() => Ok(()),
                Ok(()) => Err("WebView2 could not write the PDF".to_string()),
            });
            Ok(())
        }));

        // SAFETY: the controller belongs to this window and we are on its UI thread.
        let started = unsafe {
            webview
                .controller()
                .CoreWebView2()
                .and_then(|core| core.cast::<ICoreWebView2_7>())
                .and_then(|core| {
                    core.PrintToPdf(&output_path, None::<&ICoreWebView2PrintSettings>, &handler)
                })
        };
        if let Err(error) = started {
            slot.finish(Err(error.to_string()));
        }
    })
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub(crate) fn render_to_pdf(
    _window: &WebviewWindow,
    destination: &Path,
) -> impl Future<Output = Result<(), String>> + Send {
    let message = format!(
        "PDF export to {} is not supported by this platform's webview",
        destination.display()
    );
    async move { Err(message) }
}

#[cfg(target_os = "macos")]
fn write_rendered(
    rendered: impl Future<Output = Result<Vec<u8>, String>> + Send,
    destination: &Path,
) -> impl Future<Output = Result<(), String>> + Send {
    let destination = destination.to_path_buf();
    async move {
        let bytes = rendered.await?;
        tokio::fs::write(&destination, bytes)
            .await
            .map_err(|error| format!("Failed to write {}: {error}", destination.display()))
    }
}
