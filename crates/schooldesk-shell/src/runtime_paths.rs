use std::path::{Path, PathBuf};

use crate::{APP_DATA_DIR_NAME, BACKEND_CONFIG_FILE, DESKTOP_LOG_DIR, FALLBACK_APP_DATA_DIR};

/// Per-user data directory holding the desktop log and the backend config file.
pub fn default_user_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DATA_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(FALLBACK_APP_DATA_DIR))
}

pub fn resolve_desktop_log_path(user_data_dir: Option<PathBuf>, file_name: &str) -> PathBuf {
    user_data_dir
        .unwrap_or_else(default_user_data_dir)
        .join(DESKTOP_LOG_DIR)
        .join(file_name)
}

pub fn backend_config_path(user_data_dir: &Path) -> PathBuf {
    user_data_dir.join(BACKEND_CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn desktop_log_lives_under_logs_dir() {
        let path = resolve_desktop_log_path(Some(PathBuf::from("/data/app")), "desktop.log");
        assert_eq!(path, PathBuf::from("/data/app/logs/desktop.log"));
    }

    #[test]
    fn backend_config_sits_next_to_logs() {
        assert_eq!(
            backend_config_path(&PathBuf::from("/data/app")),
            PathBuf::from("/data/app/backend.env")
        );
    }
}
