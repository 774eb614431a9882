use directories::ProjectDirs;
use std::path::PathBuf;

/// Overrides every walkr directory when set
pub const HOME_ENV: &str = "WALKR_HOME";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn state_dir() -> PathBuf {
        if let Ok(root) = std::env::var(HOME_ENV) {
            return PathBuf::from(root);
        }
        if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("walkr")
        } else {
            ProjectDirs::from("", "", "walkr")
                .map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."))
        }
    }

    pub fn config_dir() -> PathBuf {
        if let Ok(root) = std::env::var(HOME_ENV) {
            return PathBuf::from(root);
        }
        ProjectDirs::from("", "", "walkr")
            .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn db_path() -> PathBuf {
        Self::state_dir().join("walkr.db")
    }

    pub fn users_db_path() -> PathBuf {
        Self::state_dir().join("users.db")
    }

    pub fn log_path() -> PathBuf {
        Self::state_dir().join("walkr.log")
    }

    pub fn cache_root() -> PathBuf {
        Self::state_dir().join("cache")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.json")
    }
}
