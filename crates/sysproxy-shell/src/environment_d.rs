//! User-session variables through systemd `environment.d`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use sysproxy_backend::env::{BYPASS_KEYS, PROXY_KEYS, bypass_assignments, proxy_assignments};
use sysproxy_backend::{BypassList, EnvironmentSink, ProxyState, SinkError};
use sysproxy_platform::{CommandRunner, args};

use crate::config::{self, Dialect, ManagedLineSet};

pub const PROXY_FILE: &str = "01-proxy.conf";
pub const BYPASS_FILE: &str = "02-bypass-domains.conf";

pub struct EnvironmentDirSink {
    dir: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl EnvironmentDirSink {
    #[must_use]
    pub fn new(dir: PathBuf, runner: Arc<dyn CommandRunner>) -> Self {
        Self { dir, runner }
    }

    /// `$XDG_CONFIG_HOME/environment.d`.
    #[must_use]
    pub fn user_dir() -> Option<PathBuf> {
        sysproxy_platform::xdg_config_home().map(|config| config.join("environment.d"))
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_file(
        &self,
        file: &str,
        keys: &[&'static str],
        assignments: &[sysproxy_backend::env::Assignment],
    ) -> Option<SinkError> {
        let path = self.dir.join(file);
        let result = if assignments.is_empty() {
            remove_file(&path)
        } else {
            let set = ManagedLineSet::new(Dialect::EnvironmentD, keys);
            config::write(&path, &set, assignments).map(|_| ())
        };
        result.err()
    }

    async fn reload(&self) -> Option<SinkError> {
        if !self.runner.is_installed("systemctl") {
            debug!("systemctl not found, skipping user manager reload");
            return None;
        }

        let outcome = self
            .runner
            .run("systemctl", &args(["--user", "daemon-reload"]))
            .await;
        let details = match outcome {
            Ok(output) if output.success => return None,
            Ok(output) => output.failure_details(),
            Err(e) => e.to_string(),
        };
        warn!("systemctl --user daemon-reload failed: {details}");
        Some(SinkError::CommandFailed {
            sink: "environment.d",
            details,
        })
    }

    async fn finish(&self, mut errors: Vec<SinkError>) -> Vec<SinkError> {
        errors.extend(self.reload().await);
        errors
    }
}

fn remove_file(path: &Path) -> Result<(), SinkError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SinkError::file(path, &e)),
    }
}

#[async_trait]
impl EnvironmentSink for EnvironmentDirSink {
    fn name(&self) -> &'static str {
        "environment.d"
    }

    async fn project_proxy(&self, state: &ProxyState) -> Vec<SinkError> {
        let errors = self
            .write_file(PROXY_FILE, &PROXY_KEYS, &proxy_assignments(state))
            .into_iter()
            .collect();
        self.finish(errors).await
    }

    async fn project_bypass(&self, bypass: &BypassList) -> Vec<SinkError> {
        let errors = self
            .write_file(BYPASS_FILE, &BYPASS_KEYS, &bypass_assignments(bypass))
            .into_iter()
            .collect();
        self.finish(errors).await
    }

    async fn clear(&self) -> Vec<SinkError> {
        let errors = [PROXY_FILE, BYPASS_FILE]
            .into_iter()
            .filter_map(|file| remove_file(&self.dir.join(file)).err())
            .collect();
        self.finish(errors).await
    }
}
