//! Sequential HTTP readiness polling against the backend's `/health`.
//!
//! Readiness is inferred from the port alone: an unrelated service that
//! already listens on the port and answers `/health` with 2xx is reported as
//! healthy. Choosing a free port is the deployment's responsibility.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{
    backend_config::backend_health_url,
    logging::{DesktopLogCategory, LogSink},
    HEALTH_PROBE_INTERVAL, HEALTH_REQUEST_TIMEOUT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    pub healthy: bool,
    pub attempts: u32,
    pub elapsed: Duration,
}

#[derive(Clone)]
pub struct HealthProber {
    client: reqwest::Client,
    interval: Duration,
    request_timeout: Duration,
    log: Arc<LogSink>,
}

impl HealthProber {
    pub fn new(log: Arc<LogSink>) -> Result<Self, String> {
        Self::with_timing(HEALTH_PROBE_INTERVAL, HEALTH_REQUEST_TIMEOUT, log)
    }

    pub fn with_timing(
        interval: Duration,
        request_timeout: Duration,
        log: Arc<LogSink>,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(|error| format!("Failed to create health probe client: {error}"))?;
        Ok(Self {
            client,
            interval,
            request_timeout,
            log,
        })
    }

    pub async fn wait_until_healthy(&self, port: u16, timeout: Duration) -> bool {
        self.probe_until(&backend_health_url(port), timeout)
            .await
            .healthy
    }

    /// Polls `url` until it answers 2xx or `timeout` of wall-clock time has
    /// passed. Requests never overlap and none outlives the deadline.
    pub async fn probe_until(&self, url: &str, timeout: Duration) -> ProbeReport {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut attempts = 0_u32;
        let mut last_failure = String::from("no attempt made");

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }

            attempts += 1;
            let request_budget = self.request_timeout.min(deadline - now);
            match tokio::time::timeout(request_budget, self.client.get(url).send()).await {
                Ok(Ok(response)) if response.status().is_success() => {
                    let report = ProbeReport {
                        healthy: true,
                        attempts,
                        elapsed: started.elapsed(),
                    };
                    self.log.append(
                        DesktopLogCategory::Startup,
                        &format!(
                            "health probe {url} succeeded after {} attempts in {}ms",
                            report.attempts,
                            report.elapsed.as_millis()
                        ),
                    );
                    return report;
                }
                Ok(Ok(response)) => last_failure = format!("status {}", response.status()),
                Ok(Err(error)) => last_failure = error.to_string(),
                Err(_) => {
                    last_failure = format!("no response within {}ms", request_budget.as_millis())
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(self.interval.min(deadline - now)).await;
        }

        let report = ProbeReport {
            healthy: false,
            attempts,
            elapsed: started.elapsed(),
        };
        self.log.append(
            DesktopLogCategory::Startup,
            &format!(
                "health probe {url} gave up after {} attempts in {}ms: {last_failure}",
                report.attempts,
                report.elapsed.as_millis()
            ),
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Arc,
        time::{Duration, Instant},
    };

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use super::*;

    fn prober() -> HealthProber {
        let temp_log = std::env::temp_dir().join("schooldesk-health-probe-tests.log");
        HealthProber::new(Arc::new(LogSink::file_only(temp_log))).expect("prober")
    }

    /// Serves `/health` with 503 until `ready_after` has passed, then 200.
    async fn spawn_flaky_health_server(ready_after: Duration) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let started = Instant::now();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buffer = [0_u8; 1024];
                let _ = socket.read(&mut buffer).await;
                let status = if started.elapsed() >= ready_after {
                    "200 OK"
                } else {
                    "503 Service Unavailable"
                };
                let response =
                    format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        port
    }

    /// Accepts connections and never answers.
    async fn spawn_silent_server() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        port
    }

    #[tokio::test]
    async fn becomes_healthy_after_initial_503s() {
        let port = spawn_flaky_health_server(Duration::from_secs(2)).await;

        let report = prober()
            .probe_until(&backend_health_url(port), Duration::from_secs(10))
            .await;

        assert!(report.healthy);
        assert!(
            (6..=12).contains(&report.attempts),
            "expected roughly 8 attempts, got {}",
            report.attempts
        );
        assert!(report.elapsed >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn silent_endpoint_times_out_within_bound() {
        let port = spawn_silent_server().await;
        let started = Instant::now();

        let healthy = prober()
            .wait_until_healthy(port, Duration::from_millis(3000))
            .await;

        let elapsed = started.elapsed();
        assert!(!healthy);
        assert!(elapsed >= Duration::from_millis(3000), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(3300), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn refused_connections_are_retried_until_deadline() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("addr").port()
        };

        let report = prober()
            .probe_until(&backend_health_url(port), Duration::from_millis(800))
            .await;

        assert!(!report.healthy);
        assert!(report.attempts >= 2, "attempts {}", report.attempts);
        assert!(report.elapsed < Duration::from_millis(1100));
    }

    #[tokio::test]
    async fn immediate_success_returns_on_first_attempt() {
        let port = spawn_flaky_health_server(Duration::ZERO).await;

        let report = prober()
            .probe_until(&backend_health_url(port), Duration::from_secs(5))
            .await;

        assert!(report.healthy);
        assert_eq!(report.attempts, 1);
    }
}
