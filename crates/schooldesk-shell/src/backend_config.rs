use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use thiserror::Error;
use url::Url;

use crate::{
    runtime_paths, RunMode, BACKEND_API_PATH, BACKEND_CMD_ENV, BACKEND_CWD_ENV,
    BACKEND_ENTRY_ENV, BACKEND_HEALTH_PATH, BACKEND_HOST, BACKEND_PORT_ENV, CHILD_CONFIG_FILE_ENV,
    CHILD_MODE_ENV, CHILD_PORT_ENV, DEFAULT_BACKEND_ENTRY, DEFAULT_BACKEND_PORT,
    DEFAULT_DEV_SERVER_URL, DEFAULT_NODE_EXECUTABLE, DEFAULT_RESTART_HEALTH_TIMEOUT_MS,
    DEFAULT_STARTUP_HEALTH_TIMEOUT_MS, DEV_SERVER_URL_ENV, DEV_SPAWN_BACKEND_ENV,
    HEALTH_TIMEOUT_MAX_MS, HEALTH_TIMEOUT_MIN_MS, NODE_PATH_ENV, PACKAGED_FRONTEND_ENTRY,
    RESTART_TIMEOUT_ENV, RUN_MODE_ENV, STARTUP_TIMEOUT_ENV,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid SCHOOLDESK_BACKEND_CMD: {0}")]
    InvalidBackendCommand(String),
    #[error("SCHOOLDESK_BACKEND_CMD is empty.")]
    EmptyBackendCommand,
    #[error("Invalid SCHOOLDESK_DEV_SERVER_URL '{value}': {reason}")]
    InvalidDevServerUrl { value: String, reason: String },
}

/// How the backend child is launched. The entry script, when present, must
/// exist on disk before a spawn is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub cmd: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub entry_script: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub port: u16,
}

/// Where the main window loads the renderer from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSource {
    DevServer(Url),
    Packaged { entry: String },
}

#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub mode: RunMode,
    pub backend_port: u16,
    pub user_data_dir: PathBuf,
    pub backend_config_file: PathBuf,
    pub dev_server_url: Url,
    pub manage_backend: bool,
    pub startup_timeout: Duration,
    pub restart_timeout: Duration,
    pub launch: LaunchPlan,
}

impl ShellConfig {
    pub fn from_env(resource_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let working_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_lookup(
            |key| env::var(key).ok(),
            resource_dir,
            &working_dir,
            runtime_paths::default_user_data_dir(),
        )
    }

    pub fn from_lookup<F>(
        lookup: F,
        resource_dir: Option<&Path>,
        working_dir: &Path,
        user_data_dir: PathBuf,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let mode = value(RUN_MODE_ENV)
            .and_then(|raw| RunMode::parse(&raw))
            .unwrap_or_else(RunMode::from_build);
        let backend_port = value(BACKEND_PORT_ENV)
            .and_then(|raw| raw.parse::<u16>().ok())
            .filter(|port| *port != 0)
            .unwrap_or(DEFAULT_BACKEND_PORT);

        let raw_dev_url =
            value(DEV_SERVER_URL_ENV).unwrap_or_else(|| DEFAULT_DEV_SERVER_URL.into());
        let dev_server_url =
            Url::parse(&raw_dev_url).map_err(|error| ConfigError::InvalidDevServerUrl {
                value: raw_dev_url.clone(),
                reason: error.to_string(),
            })?;

        let manage_backend =
            mode.is_production() || value(DEV_SPAWN_BACKEND_ENV).is_some_and(|raw| raw == "1");
        let backend_config_file = runtime_paths::backend_config_path(&user_data_dir);

        let (cmd, args, entry_script) = match value(BACKEND_CMD_ENV) {
            Some(custom_cmd) => {
                let mut pieces = shlex::split(&custom_cmd)
                    .ok_or_else(|| ConfigError::InvalidBackendCommand(custom_cmd.clone()))?;
                if pieces.is_empty() {
                    return Err(ConfigError::EmptyBackendCommand);
                }
                let cmd = pieces.remove(0);
                (cmd, pieces, None)
            }
            None => {
                let entry = value(BACKEND_ENTRY_ENV)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| {
                        let base = match (mode, resource_dir) {
                            (RunMode::Production, Some(resource_dir)) => resource_dir,
                            _ => working_dir,
                        };
                        base.join(DEFAULT_BACKEND_ENTRY)
                    });
                let cmd = value(NODE_PATH_ENV).unwrap_or_else(|| DEFAULT_NODE_EXECUTABLE.into());
                let args = vec![entry.to_string_lossy().to_string()];
                (cmd, args, Some(entry))
            }
        };

        let cwd = value(BACKEND_CWD_ENV)
            .map(PathBuf::from)
            .or_else(|| {
                entry_script
                    .as_deref()
                    .and_then(Path::parent)
                    .map(Path::to_path_buf)
            })
            .unwrap_or_else(|| working_dir.to_path_buf());

        let launch = LaunchPlan {
            cmd,
            args,
            cwd,
            entry_script,
            env: vec![
                (CHILD_PORT_ENV.to_string(), backend_port.to_string()),
                (CHILD_MODE_ENV.to_string(), mode.as_env_value().to_string()),
                (
                    CHILD_CONFIG_FILE_ENV.to_string(),
                    backend_config_file.to_string_lossy().to_string(),
                ),
            ],
            port: backend_port,
        };

        Ok(Self {
            mode,
            backend_port,
            user_data_dir,
            backend_config_file,
            dev_server_url,
            manage_backend,
            startup_timeout: resolve_timeout(
                value(STARTUP_TIMEOUT_ENV),
                DEFAULT_STARTUP_HEALTH_TIMEOUT_MS,
            ),
            restart_timeout: resolve_timeout(
                value(RESTART_TIMEOUT_ENV),
                DEFAULT_RESTART_HEALTH_TIMEOUT_MS,
            ),
            launch,
        })
    }

    pub fn load_source(&self) -> LoadSource {
        match self.mode {
            RunMode::Development => LoadSource::DevServer(self.dev_server_url.clone()),
            RunMode::Production => LoadSource::Packaged {
                entry: PACKAGED_FRONTEND_ENTRY.to_string(),
            },
        }
    }
}

fn resolve_timeout(raw: Option<String>, default_ms: u64) -> Duration {
    let parsed = raw
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default_ms);
    Duration::from_millis(parsed.clamp(HEALTH_TIMEOUT_MIN_MS, HEALTH_TIMEOUT_MAX_MS))
}

pub fn backend_base_url(port: u16) -> String {
    format!("http://{BACKEND_HOST}:{port}{BACKEND_API_PATH}")
}

pub fn backend_health_url(port: u16) -> String {
    format!("http://{BACKEND_HOST}:{port}{BACKEND_HEALTH_PATH}")
}

pub fn build_debug_command(plan: &LaunchPlan) -> Vec<String> {
    let mut parts = vec![plan.cmd.clone()];
    parts.extend(plan.args.clone());
    parts
}
