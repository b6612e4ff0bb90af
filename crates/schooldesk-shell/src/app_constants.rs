use std::time::Duration;

pub const APP_DATA_DIR_NAME: &str = "SchoolDesk";
pub const FALLBACK_APP_DATA_DIR: &str = ".schooldesk";
pub const DESKTOP_LOG_DIR: &str = "logs";
pub const DESKTOP_LOG_FILE: &str = "desktop.log";
pub const BACKEND_CONFIG_FILE: &str = "backend.env";

pub const DEFAULT_BACKEND_PORT: u16 = 5000;
pub const DEFAULT_NODE_EXECUTABLE: &str = "node";
pub const DEFAULT_BACKEND_ENTRY: &str = "backend/server.js";
pub const DEFAULT_DEV_SERVER_URL: &str = "http://localhost:5173/";
pub const PACKAGED_FRONTEND_ENTRY: &str = "index.html";
pub const BACKEND_HOST: &str = "127.0.0.1";
pub const BACKEND_HEALTH_PATH: &str = "/health";
pub const BACKEND_API_PATH: &str = "/api";
pub const BACKEND_PORT_QUERY_KEY: &str = "backendPort";

pub const RUN_MODE_ENV: &str = "SCHOOLDESK_RUN_MODE";
pub const BACKEND_PORT_ENV: &str = "SCHOOLDESK_BACKEND_PORT";
pub const NODE_PATH_ENV: &str = "SCHOOLDESK_NODE_PATH";
pub const BACKEND_ENTRY_ENV: &str = "SCHOOLDESK_BACKEND_ENTRY";
pub const BACKEND_CMD_ENV: &str = "SCHOOLDESK_BACKEND_CMD";
pub const BACKEND_CWD_ENV: &str = "SCHOOLDESK_BACKEND_CWD";
pub const DEV_SERVER_URL_ENV: &str = "SCHOOLDESK_DEV_SERVER_URL";
pub const DEV_SPAWN_BACKEND_ENV: &str = "SCHOOLDESK_DEV_SPAWN_BACKEND";
pub const STARTUP_TIMEOUT_ENV: &str = "SCHOOLDESK_STARTUP_TIMEOUT_MS";
pub const RESTART_TIMEOUT_ENV: &str = "SCHOOLDESK_RESTART_TIMEOUT_MS";

pub const CHILD_PORT_ENV: &str = "PORT";
pub const CHILD_MODE_ENV: &str = "NODE_ENV";
pub const CHILD_CONFIG_FILE_ENV: &str = "SCHOOLDESK_CONFIG_FILE";

pub const DEFAULT_STARTUP_HEALTH_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_RESTART_HEALTH_TIMEOUT_MS: u64 = 20_000;
pub const HEALTH_TIMEOUT_MIN_MS: u64 = 1_000;
pub const HEALTH_TIMEOUT_MAX_MS: u64 = 10 * 60 * 1000;
pub const DEV_SERVER_PROBE_TIMEOUT: Duration = Duration::from_secs(15);

pub const HEALTH_PROBE_INTERVAL: Duration = Duration::from_millis(250);
pub const HEALTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
pub const BACKEND_EXIT_POLL_INTERVAL: Duration = Duration::from_millis(200);
pub const EPHEMERAL_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

pub const MAIN_WINDOW_LABEL: &str = "main";
pub const SPLASH_WINDOW_LABEL: &str = "splash";
pub const PREVIEW_FILE_PREFIX: &str = "schooldesk-preview";
