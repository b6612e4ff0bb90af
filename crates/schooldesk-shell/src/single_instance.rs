//! Reaction of the running instance to a second launch. The OS-level lock
//! itself is held by the GUI shell; a losing process exits before creating
//! any window and this handler runs in the winner.

use std::sync::Arc;

use crate::{
    logging::{DesktopLogCategory, LogSink},
    window_coordinator::{WindowCoordinator, WindowFactory},
};

pub struct SecondInstanceHandler<F: WindowFactory> {
    windows: Arc<WindowCoordinator<F>>,
    log: Arc<LogSink>,
}

impl<F: WindowFactory> Clone for SecondInstanceHandler<F> {
    fn clone(&self) -> Self {
        Self {
            windows: Arc::clone(&self.windows),
            log: Arc::clone(&self.log),
        }
    }
}

impl<F: WindowFactory> SecondInstanceHandler<F> {
    pub fn new(windows: Arc<WindowCoordinator<F>>, log: Arc<LogSink>) -> Self {
        Self { windows, log }
    }

    /// Brings the existing window forward instead of opening another one.
    /// Never fails; focus problems are only logged.
    pub fn on_second_launch(&self, args: &[String], cwd: &str) {
        self.log.append(
            DesktopLogCategory::Runtime,
            &format!("second launch detected (args={args:?}, cwd={cwd}); focusing existing window"),
        );
        if !self.windows.focus_main() {
            self.windows.reactivate();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        backend_config::LoadSource,
        test_support::{test_log, MockAlerts, MockFactory},
        window_coordinator::MainWindowTarget,
        RunMode, MAIN_WINDOW_LABEL, SPLASH_WINDOW_LABEL,
    };

    fn handler(
        mode: RunMode,
    ) -> (
        SecondInstanceHandler<MockFactory>,
        Arc<WindowCoordinator<MockFactory>>,
        MockFactory,
    ) {
        let factory = MockFactory::default();
        let windows = Arc::new(WindowCoordinator::new(
            mode,
            factory.clone(),
            Arc::new(MockAlerts::default()),
            test_log(),
        ));
        (
            SecondInstanceHandler::new(Arc::clone(&windows), test_log()),
            windows,
            factory,
        )
    }

    fn target() -> MainWindowTarget {
        MainWindowTarget::new(
            LoadSource::Packaged {
                entry: "index.html".to_string(),
            },
            5000,
        )
    }

    #[test]
    fn second_launch_focuses_and_restores_main_window() {
        let (handler, windows, factory) = handler(RunMode::Production);
        windows.create_splash().expect("splash");
        windows.create_main(target()).expect("main");
        windows.on_splash_ready();
        windows.on_main_content_loaded();
        let main = factory.window(MAIN_WINDOW_LABEL).expect("main");
        main.set_minimized(true);
        let focuses_before = main.focuses();

        handler.on_second_launch(&["schooldesk".to_string()], "/home/office");

        assert_eq!(main.focuses(), focuses_before + 1);
        assert_eq!(main.unminimizes(), 1);
        assert_eq!(factory.created_count(MAIN_WINDOW_LABEL), 1);
    }

    #[test]
    fn second_launch_during_splash_focuses_splash() {
        let (handler, windows, factory) = handler(RunMode::Production);
        windows.create_splash().expect("splash");
        windows.create_main(target()).expect("main");

        handler.on_second_launch(&[], "/");

        assert_eq!(factory.window(SPLASH_WINDOW_LABEL).expect("splash").focuses(), 1);
        assert_eq!(factory.window(MAIN_WINDOW_LABEL).expect("main").shows(), 0);
    }

    #[test]
    fn second_launch_after_main_closed_recreates_it() {
        let (handler, windows, factory) = handler(RunMode::Development);
        windows.create_main(target()).expect("main");
        windows.on_main_content_loaded();
        factory
            .window(MAIN_WINDOW_LABEL)
            .expect("main")
            .destroy_externally();
        windows.on_window_destroyed(MAIN_WINDOW_LABEL);

        handler.on_second_launch(&[], "/");

        assert_eq!(factory.created_count(MAIN_WINDOW_LABEL), 2);
    }
}
