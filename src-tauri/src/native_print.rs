//! Printing a webview through the platform print pipeline. Each future
//! resolves only once the job has been handed to the spooler, cancelled,
//! or has failed, so callers may close a print-only window afterwards.

use std::future::Future;

use schooldesk_shell::PrintOptions;
use tauri::WebviewWindow;

use crate::webview_job::{run_on_webview, JobSlot};

#[cfg(target_os = "linux")]
pub(crate) fn print_webview(
    window: &WebviewWindow,
    options: &PrintOptions,
) -> impl Future<Output = Result<(), String>> + Send {
    use webkit2gtk::{
        PrintOperation, PrintOperationExt, PrintOperationResponse, SettingsExt, WebViewExt,
    };

    let options = options.clone();
    run_on_webview(window, move |webview, sender| {
        let slot = JobSlot::new(sender);
        let view = webview.inner();
        if let Some(settings) = WebViewExt::settings(&view) {
            settings.set_print_backgrounds(options.print_background);
        }

        let orientation = if options.landscape {
            gtk::PageOrientation::Landscape
        } else {
            gtk::PageOrientation::Portrait
        };
        let print_settings = gtk::PrintSettings::new();
        print_settings.set_orientation(orientation);
        if let Some(copies) = options.copies {
            print_settings.set_n_copies(i32::try_from(copies).unwrap_or(i32::MAX));
        }
        if let Some(device_name) = options.device_name.as_deref() {
            print_settings.set_printer(device_name);
        }
        let page_setup = gtk::PageSetup::new();
        page_setup.set_orientation(orientation);

        let operation = PrintOperation::new(&view);
        operation.set_print_settings(&print_settings);
        operation.set_page_setup(&page_setup);
        crate::webview_job::track_print_operation(&operation, &slot);

        if options.silent {
            operation.print();
        } else if matches!(
            operation.run_dialog(None::<&gtk::Window>),
            PrintOperationResponse::Cancel
        ) {
            slot.finish(Ok(()));
        }
    })
}

/// `runOperation` blocks in a modal print panel and returns once the job is
/// spooled. It reports NO both for cancellation and failure.
#[cfg(target_os = "macos")]
pub(crate) fn print_webview(
    window: &WebviewWindow,
    options: &PrintOptions,
) -> impl Future<Output = Result<(), String>> + Send {
    use objc2::{class, msg_send, runtime::AnyObject};
    use objc2_foundation::NSRect;

    const NS_PAPER_ORIENTATION_PORTRAIT: isize = 0;
    const NS_PAPER_ORIENTATION_LANDSCAPE: isize = 1;

    let options = options.clone();
    run_on_webview(window, move |webview, sender| {
        let slot = JobSlot::new(sender);
        let view = webview.inner().cast::<AnyObject>();
        let orientation = if options.landscape {
            NS_PAPER_ORIENTATION_LANDSCAPE
        } else {
            NS_PAPER_ORIENTATION_PORTRAIT
        };

        // SAFETY: `view` is the WKWebView backing this window and every call
        // below runs on the main thread.
        let completed = unsafe {
            let print_info: *mut AnyObject = msg_send![class!(NSPrintInfo), sharedPrintInfo];
            let _: () = msg_send![print_info, setOrientation: orientation];
            let operation: *mut AnyObject =
                msg_send![view, printOperationWithPrintInfo: print_info];
            if operation.is_null() {
                return slot.finish(Err("WebKit did not create a print operation".to_string()));
            }
            let _: () = msg_send![operation, setShowsPrintPanel: !options.silent];
            let _: () = msg_send![operation, setShowsProgressPanel: true];

            // WKWebView prints blank pages unless its print view has a frame.
            let print_view: *mut AnyObject = msg_send![operation, view];
            let bounds: NSRect = msg_send![view, bounds];
            let _: () = msg_send![print_view, setFrame: bounds];

            let completed: bool = msg_send![operation, runOperation];
            completed
        };

        slot.finish(if completed {
            Ok(())
        } else {
            Err("Print was cancelled or did not complete.".to_string())
        });
    })
}

/// The system print dialog picks printer, copies and orientation; WebView2
/// then prints with those settings and reports the job status.
#[cfg(target_os = "windows")]
pub(crate) fn print_webview(
    window: &WebviewWindow,
    options: &PrintOptions,
) -> impl Future<Output = Result<(), String>> + Send {
    let options = options.clone();
    run_on_webview(window, move |webview, sender| {
        let slot = JobSlot::new(sender);
        let mut choice = windows_print::PrintChoice::from_options(&options);
        if !options.silent {
            match windows_print::choose_printer(&mut choice) {
                Ok(true) => {}
                Ok(false) => return slot.finish(Ok(())),
                Err(error) => return slot.finish(Err(error)),
            }
        }
        if let Err(error) = windows_print::start(&webview, &choice, &options, slot.clone()) {
            slot.finish(Err(error.to_string()));
        }
    })
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub(crate) fn print_webview(
    window: &WebviewWindow,
    _options: &PrintOptions,
) -> impl Future<Output = Result<(), String>> + Send {
    let result = window.print().map_err(|error| error.to_string());
    async move { result }
}

#[cfg(target_os = "windows")]
mod windows_print {
    use schooldesk_shell::PrintOptions;
    use tauri::webview::PlatformWebview;
    use webview2_com::{
        Microsoft::Web::WebView2::Win32::{
            ICoreWebView2Environment6, ICoreWebView2PrintSettings2, ICoreWebView2_16,
            ICoreWebView2_2, COREWEBVIEW2_PRINT_ORIENTATION_LANDSCAPE,
            COREWEBVIEW2_PRINT_ORIENTATION_PORTRAIT, COREWEBVIEW2_PRINT_STATUS_SUCCEEDED,
        },
        PrintCompletedHandler,
    };
    use windows::{
        core::{Interface, HSTRING, PCWSTR},
        Win32::{
            Graphics::Gdi::DEVMODEW,
            System::Memory::{GlobalFree, GlobalLock, GlobalUnlock},
            UI::Controls::Dialogs::{
                CommDlgExtendedError, PrintDlgW, DEVNAMES, PD_NOPAGENUMS, PD_NOSELECTION,
                PD_USEDEVMODECOPIESANDCOLLATE, PRINTDLGW,
            },
        },
    };

    use crate::webview_job::JobSlot;

    const DMORIENT_LANDSCAPE: i16 = 2;

    pub(super) struct PrintChoice {
        printer: Option<String>,
        copies: i32,
        landscape: bool,
    }

    impl PrintChoice {
        pub(super) fn from_options(options: &PrintOptions) -> Self {
            Self {
                printer: options.device_name.clone(),
                copies: options
                    .copies
                    .map_or(1, |copies| i32::try_from(copies).unwrap_or(i32::MAX)),
                landscape: options.landscape,
            }
        }
    }

    /// Shows the system print dialog. `Ok(false)` when the user cancels.
    pub(super) fn choose_printer(choice: &mut PrintChoice) -> Result<bool, String> {
        let mut dialog = PRINTDLGW {
            lStructSize: std::mem::size_of::<PRINTDLGW>() as u32,
            Flags: PD_NOPAGENUMS | PD_NOSELECTION | PD_USEDEVMODECOPIESANDCOLLATE,
            nCopies: u16::try_from(choice.copies).unwrap_or(1),
            ..Default::default()
        };

        // SAFETY: `dialog` is fully initialized and outlives the modal call.
        if !unsafe { PrintDlgW(&mut dialog) }.as_bool() {
            let code = unsafe { CommDlgExtendedError() };
            return if code.0 == 0 {
                Ok(false)
            } else {
                Err(format!("print dialog failed with code {:#x}", code.0))
            };
        }

        // SAFETY: the dialog allocated both handles; each is locked only
        // while read and freed exactly once.
        unsafe {
            let names = GlobalLock(dialog.hDevNames) as *const DEVNAMES;
            if !names.is_null() {
                let device = PCWSTR((names as *const u16).add(usize::from((*names).wDeviceOffset)));
                choice.printer = device.to_string().ok();
                let _ = GlobalUnlock(dialog.hDevNames);
            }
            let mode = GlobalLock(dialog.hDevMode) as *const DEVMODEW;
            if !mode.is_null() {
                let fields = (*mode).Anonymous1.Anonymous1;
                choice.copies = i32::from(fields.dmCopies.max(1));
                choice.landscape = fields.dmOrientation == DMORIENT_LANDSCAPE;
                let _ = GlobalUnlock(dialog.hDevMode);
            }
            let _ = GlobalFree(Some(dialog.hDevNames));
            let _ = GlobalFree(Some(dialog.hDevMode));
        }
        Ok(true)
    }

    pub(super) fn start(
        webview: &PlatformWebview,
        choice: &PrintChoice,
        options: &PrintOptions,
        slot: JobSlot<()>,
    ) -> windows::core::Result<()> {
        // SAFETY: the controller belongs to this window and we are on its UI thread.
        unsafe {
            let core = webview.controller().CoreWebView2()?;
            let environment = core
                .cast::<ICoreWebView2_2>()?
                .Environment()?
                .cast::<ICoreWebView2Environment6>()?;
            let settings = environment.CreatePrintSettings()?;
            settings.SetOrientation(if choice.landscape {
                COREWEBVIEW2_PRINT_ORIENTATION_LANDSCAPE
            } else {
                COREWEBVIEW2_PRINT_ORIENTATION_PORTRAIT
            })?;
            settings.SetShouldPrintBackgrounds(options.print_background.into())?;

            let settings2 = settings.cast::<ICoreWebView2PrintSettings2>()?;
            settings2.SetCopies(choice.copies)?;
            if let Some(printer) = choice.printer.as_deref() {
                settings2.SetPrinterName(&HSTRING::from(printer))?;
            }

            let handler = PrintCompletedHandler::create(Box::new(move |result, status| {
                slot.finish(match result {
                    Err(error) => Err(error.to_string()),
                    Ok(()) if status == COREWEBVIEW2_PRINT_STATUS_SUCCEEDED => Ok(()),
                    Ok(()) => Err(format!("printer reported status {}", status.0)),
                });
                Ok(())
            }));
            core.cast::<ICoreWebView2_16>()?.Print(&settings, &handler)
        }
    }
}
