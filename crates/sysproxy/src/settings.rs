use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};
use sysproxy_platform::AppPaths;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_true")]
    pub project_shells: bool,

    #[serde(default = "default_true")]
    pub project_environment_d: bool,

    #[serde(default = "default_true")]
    pub project_user_environment: bool,

    #[serde(default = "default_true")]
    pub mirror_kde_to_gsettings: bool,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            project_shells: true,
            project_environment_d: true,
            project_user_environment: true,
            mirror_kde_to_gsettings: true,
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
        }
    }
}

impl SyncSettings {
    /// Reads the settings file; a missing or unreadable file yields defaults.
    pub fn load() -> Self {
        let Ok(paths) = AppPaths::new() else {
            return Self::default();
        };
        Self::load_from(&paths.settings_file())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Ignoring invalid settings file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) => {
                warn!("Could not read {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<(), std::io::Error> {
        let paths = AppPaths::new().map_err(std::io::Error::other)?;
        paths.ensure_dirs()?;
        self.save_to(&paths.settings_file())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
    }
}
