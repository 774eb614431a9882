use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::app_dirs::AppDirs;
use crate::session::Tuning;

/// Environment variable that overrides the backend port
pub const PORT_ENV: &str = "WALKR_PORT";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Acceleration magnitude (m/s²) above which a sample may count as a step
    pub step_threshold: f64,
    /// Minimum milliseconds between two counted steps
    pub step_debounce_ms: u64,
    /// Drop fixes reporting worse accuracy than this many meters
    pub max_fix_accuracy_m: Option<f64>,
    /// Whether the motion sensor sits behind a permission prompt
    pub motion_permission_prompt: bool,
    pub server_port: u16,
    pub backend_url: String,
}

impl Default for Config {
    fn default() -> Self {
        let tuning = Tuning::default();
        Self {
            step_threshold: tuning.step_threshold,
            step_debounce_ms: tuning.step_debounce_ms,
            max_fix_accuracy_m: tuning.max_fix_accuracy_m,
            motion_permission_prompt: false,
            server_port: 3000,
            backend_url: "http://localhost:3000".to_string(),
        }
    }
}

impl Config {
    pub fn tuning(&self) -> Tuning {
        Tuning {
            step_threshold: self.step_threshold,
            step_debounce_ms: self.step_debounce_ms,
            max_fix_accuracy_m: self.max_fix_accuracy_m,
        }
    }

    /// Server port, honouring `WALKR_PORT` when it parses
    pub fn resolved_port(&self) -> u16 {
        match std::env::var(PORT_ENV) {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("Invalid {PORT_ENV} value {raw:?}: {e}, using {}", self.server_port);
                self.server_port
            }),
            Err(_) => self.server_port,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        serde_json::from_slice::<Config>(&bytes).unwrap_or_else(|e| {
            warn!("ignoring malformed config at {}: {e}", self.path.display());
            Config::default()
        })
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("absent.json"));
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "step_threshold": 70.0, "max_fix_accuracy_m": 30.0 }"#).unwrap();

        let cfg = FileConfigStore::with_path(&path).load();
        assert_eq!(cfg.step_threshold, 70.0);
        assert_eq!(cfg.step_debounce_ms, 500);
        assert_eq!(cfg.server_port, 3000);

        let tuning = cfg.tuning();
        assert_eq!(tuning.max_fix_accuracy_m, Some(30.0));
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(FileConfigStore::with_path(&path).load(), Config::default());
    }
}
