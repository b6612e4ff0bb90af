use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::{
    backend_config::{backend_base_url, LaunchPlan, ShellConfig},
    backend_process::{BackendSupervisor, SpawnError},
    health_probe::HealthProber,
    logging::{DesktopLogCategory, LogSink},
    RunMode,
};

pub(crate) struct AtomicFlagGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> AtomicFlagGuard<'a> {
    pub(crate) fn try_set(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(Self { flag })
    }
}

impl Drop for AtomicFlagGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartOutcome {
    /// The backend is externally managed; nothing was restarted.
    Skipped { base_url: String },
    /// A previous restart has not finished yet.
    Rejected { base_url: String },
    Completed { base_url: String, healthy: bool },
    Failed { base_url: String, error: String },
}

/// Owns the backend lifecycle policy: spawn-then-probe at startup and
/// serialized stop/start/probe restarts.
pub struct BackendController {
    mode: RunMode,
    manage_backend: bool,
    plan: LaunchPlan,
    restart_timeout: Duration,
    supervisor: Arc<BackendSupervisor>,
    prober: HealthProber,
    is_restarting: AtomicBool,
    log: Arc<LogSink>,
}

impl BackendController {
    pub fn new(
        config: &ShellConfig,
        supervisor: Arc<BackendSupervisor>,
        prober: HealthProber,
        log: Arc<LogSink>,
    ) -> Self {
        Self {
            mode: config.mode,
            manage_backend: config.manage_backend,
            plan: config.launch.clone(),
            restart_timeout: config.restart_timeout,
            supervisor,
            prober,
            is_restarting: AtomicBool::new(false),
            log,
        }
    }

    pub fn supervisor(&self) -> &Arc<BackendSupervisor> {
        &self.supervisor
    }

    pub fn prober(&self) -> &HealthProber {
        &self.prober
    }

    pub fn manages_backend(&self) -> bool {
        self.manage_backend
    }

    pub fn is_restart_in_progress(&self) -> bool {
        self.is_restarting.load(Ordering::Acquire)
    }

    /// API base derived from the port currently recorded by the supervisor.
    pub fn base_url(&self) -> String {
        backend_base_url(self.supervisor.port())
    }

    /// Spawns the backend and polls its health. `Ok(false)` means the process
    /// runs but never reported healthy within `timeout`.
    pub async fn start_and_wait(&self, timeout: Duration) -> Result<bool, SpawnError> {
        let handle = self.supervisor.start(&self.plan)?;
        self.log.append(
            DesktopLogCategory::Startup,
            &format!(
                "waiting up to {}ms for backend pid {} to report healthy",
                timeout.as_millis(),
                handle.pid
            ),
        );
        let healthy = self
            .prober
            .wait_until_healthy(self.supervisor.port(), timeout)
            .await;
        self.supervisor.record_health(healthy);
        Ok(healthy)
    }

    /// Development restarts are always no-ops, even when the shell spawned
    /// the development backend itself.
    pub async fn restart(&self) -> RestartOutcome {
        if !self.mode.is_production() || !self.manage_backend {
            self.log.append(
                DesktopLogCategory::Restart,
                &format!("restart skipped: backend is not restartable in {} mode", self.mode),
            );
            return RestartOutcome::Skipped {
                base_url: self.base_url(),
            };
        }

        let Some(_restart_guard) = AtomicFlagGuard::try_set(&self.is_restarting) else {
            self.log.append(
                DesktopLogCategory::Restart,
                "restart rejected: previous restart still in progress",
            );
            return RestartOutcome::Rejected {
                base_url: self.base_url(),
            };
        };

        self.log
            .append(DesktopLogCategory::Restart, "restarting backend process");
        let supervisor = Arc::clone(&self.supervisor);
        if let Err(error) = tokio::task::spawn_blocking(move || supervisor.stop_current()).await {
            self.log.append(
                DesktopLogCategory::Restart,
                &format!("backend stop task failed: {error}"),
            );
        }

        match self.start_and_wait(self.restart_timeout).await {
            Ok(healthy) => {
                if !healthy {
                    // The renderer learns about a dead backend from its own API calls.
                    self.log.append(
                        DesktopLogCategory::Restart,
                        &format!(
                            "backend did not report healthy within {}ms after restart",
                            self.restart_timeout.as_millis()
                        ),
                    );
                }
                RestartOutcome::Completed {
                    base_url: self.base_url(),
                    healthy,
                }
            }
            Err(error) => {
                self.log.append(
                    DesktopLogCategory::Restart,
                    &format!("backend restart failed: {error}"),
                );
                RestartOutcome::Failed {
                    base_url: self.base_url(),
                    error: error.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{atomic::AtomicBool, Arc},
        time::Duration,
    };

    use super::*;
    use crate::{
        test_support::{spawn_health_server, test_controller, test_controller_with, unused_port},
        DEV_SPAWN_BACKEND_ENV,
    };

    #[test]
    fn atomic_flag_guard_try_set_rejects_double_set_until_drop() {
        let flag = AtomicBool::new(false);

        let guard = AtomicFlagGuard::try_set(&flag).expect("first set should succeed");
        assert!(flag.load(Ordering::Relaxed));
        assert!(AtomicFlagGuard::try_set(&flag).is_none());

        drop(guard);
        assert!(!flag.load(Ordering::Relaxed));
        assert!(AtomicFlagGuard::try_set(&flag).is_some());
    }

    #[tokio::test]
    async fn development_restart_is_a_no_op_returning_base_url() {
        let temp = tempfile::tempdir().expect("tempdir");
        let controller = test_controller(temp.path(), RunMode::Development, 5123);

        let outcome = controller.restart().await;

        assert_eq!(
            outcome,
            RestartOutcome::Skipped {
                base_url: "http://127.0.0.1:5123/api".to_string()
            }
        );
        assert!(!controller.supervisor().is_running());
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn development_restart_leaves_a_shell_spawned_backend_alone() {
        let temp = tempfile::tempdir().expect("tempdir");
        let port = spawn_health_server().await;
        let controller = test_controller_with(
            temp.path(),
            RunMode::Development,
            port,
            &[(DEV_SPAWN_BACKEND_ENV, "1".to_string())],
        );
        assert!(controller.manages_backend());
        assert!(controller
            .start_and_wait(Duration::from_secs(2))
            .await
            .expect("start"));
        let pid = controller.supervisor().state().pid;

        let outcome = controller.restart().await;

        assert_eq!(
            outcome,
            RestartOutcome::Skipped {
                base_url: format!("http://127.0.0.1:{port}/api")
            }
        );
        assert_eq!(controller.supervisor().state().pid, pid);
        assert!(controller.supervisor().is_running());
        controller.supervisor().stop_current();
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn overlapping_restart_is_rejected_while_health_wait_runs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let controller = Arc::new(test_controller(
            temp.path(),
            RunMode::Production,
            unused_port(),
        ));

        let first = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.restart().await })
        };
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(controller.is_restart_in_progress());

        let second = controller.restart().await;
        assert!(matches!(second, RestartOutcome::Rejected { .. }));

        let first = first.await.expect("join");
        assert!(matches!(
            first,
            RestartOutcome::Completed { healthy: false, .. }
        ));
        assert!(!controller.is_restart_in_progress());
        assert!(controller.supervisor().is_running());
        controller.supervisor().stop_current();
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn restart_replaces_the_process_and_reports_health() {
        let temp = tempfile::tempdir().expect("tempdir");
        let port = spawn_health_server().await;
        let controller = test_controller(temp.path(), RunMode::Production, port);

        assert!(controller
            .start_and_wait(Duration::from_secs(2))
            .await
            .expect("start"));
        let first_pid = controller.supervisor().state().pid;

        let outcome = controller.restart().await;

        assert_eq!(
            outcome,
            RestartOutcome::Completed {
                base_url: format!("http://127.0.0.1:{port}/api"),
                healthy: true
            }
        );
        let state = controller.supervisor().state();
        assert!(state.pid.is_some());
        assert_ne!(state.pid, first_pid);
        controller.supervisor().stop_current();
    }
}
