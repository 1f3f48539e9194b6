use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AppPathsError {
    #[error("Could not determine home directory")]
    HomeDirUnavailable,
    #[error("Could not determine config directory")]
    ConfigDirUnavailable,
    #[error("Could not determine data directory")]
    DataDirUnavailable,
}

pub struct AppPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

const APP_DIR: &str = "sysproxy";

impl AppPaths {
    /// Resolves the per-user directories: `~/Library/Application Support`
    /// on macOS, the `dirs` config and data directories elsewhere.
    pub fn new() -> Result<Self, AppPathsError> {
        if cfg!(target_os = "macos") {
            let home = dirs::home_dir().ok_or(AppPathsError::HomeDirUnavailable)?;
            return Ok(Self::under(home.join("Library/Application Support")));
        }

        let config = dirs::config_dir().ok_or(AppPathsError::ConfigDirUnavailable)?;
        let data = dirs::data_dir().ok_or(AppPathsError::DataDirUnavailable)?;
        Ok(Self {
            config_dir: config.join(APP_DIR),
            data_dir: data.join(APP_DIR),
        })
    }

    /// Keeps settings and logs together in `<root>/sysproxy`.
    #[must_use]
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let dir = root.into().join(APP_DIR);
        Self {
            config_dir: dir.clone(),
            data_dir: dir,
        }
    }

    #[must_use]
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }

    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("sysproxy.log")
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}
