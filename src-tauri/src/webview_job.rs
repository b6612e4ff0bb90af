//! Native work scheduled on a window's platform webview that reports its
//! outcome asynchronously.

use std::{any::Any, cell::RefCell, future::Future, rc::Rc};

use tauri::{webview::PlatformWebview, WebviewWindow};
use tokio::sync::oneshot;

pub(crate) type JobSender<T> = oneshot::Sender<Result<T, String>>;

/// Runs `job` on the main thread with the native webview and resolves with
/// whatever the job eventually sends. A job that drops its sender without
/// answering resolves as a failure.
pub(crate) fn run_on_webview<T, F>(
    window: &WebviewWindow,
    job: F,
) -> impl Future<Output = Result<T, String>> + Send
where
    T: Send + 'static,
    F: FnOnce(PlatformWebview, JobSender<T>) + Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    let scheduled = window
        .with_webview(move |webview| job(webview, sender))
        .map_err(|error| error.to_string());

    async move {
        scheduled?;
        receiver
            .await
            .map_err(|_| "the webview abandoned the native job".to_string())?
    }
}

/// Single-use completion slot shared between native callbacks. The first
/// `finish` wins; later calls are ignored. Values passed to `keep_alive`
/// live until the job finishes.
pub(crate) struct JobSlot<T> {
    inner: Rc<RefCell<Option<(JobSender<T>, Vec<Box<dyn Any>>)>>>,
}

impl<T> Clone for JobSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> JobSlot<T> {
    pub(crate) fn new(sender: JobSender<T>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Some((sender, Vec::new())))),
        }
    }

    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    pub(crate) fn keep_alive(&self, value: impl Any) {
        if let Some((_, held)) = self.inner.borrow_mut().as_mut() {
            held.push(Box::new(value));
        }
    }

    pub(crate) fn finish(&self, outcome: Result<T, String>) {
        let pending = self.inner.borrow_mut().take();
        if let Some((sender, held)) = pending {
            let _ = sender.send(outcome);
            drop(held);
        }
    }
}

/// Wires a WebKitGTK print operation's terminal signals into `slot`.
#[cfg(target_os = "linux")]
pub(crate) fn track_print_operation(operation: &webkit2gtk::PrintOperation, slot: &JobSlot<()>) {
    use webkit2gtk::PrintOperationExt;

    // The operation must outlive `print()`; the slot releases it on completion.
    slot.keep_alive(operation.clone());
    let on_failed = slot.clone();
    operation.connect_failed(move |_, error| on_failed.finish(Err(error.to_string())));
    let on_finished = slot.clone();
    operation.connect_finished(move |_| on_finished.finish(Ok(())));
}
