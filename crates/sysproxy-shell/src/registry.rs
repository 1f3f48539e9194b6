use async_trait::async_trait;
use log::{info, warn};
use sysproxy_backend::env::{BYPASS_KEYS, PROXY_KEYS, bypass_assignments, proxy_assignments};
use sysproxy_backend::{BypassList, EnvironmentSink, ProxyState, SinkError};

use crate::config::{self, ManagedLineSet};
use crate::detect::{ShellDescriptor, detect_shells};

/// Projects proxy variables into the rc file of every installed shell.
pub struct ShellEnvironmentRegistry {
    shells: Vec<ShellDescriptor>,
}

impl ShellEnvironmentRegistry {
    #[must_use]
    pub fn detect() -> Self {
        Self::new(detect_shells())
    }

    #[must_use]
    pub fn new(shells: Vec<ShellDescriptor>) -> Self {
        Self { shells }
    }

    #[must_use]
    pub fn shells(&self) -> &[ShellDescriptor] {
        &self.shells
    }

    /// Rewrites the proxy variables, or strips them when `state` is disabled.
    pub fn apply(&self, state: &ProxyState) -> Vec<SinkError> {
        let assignments = proxy_assignments(state);
        self.patch_all(&PROXY_KEYS, &assignments)
    }

    /// Rewrites `no_proxy`/`NO_PROXY`, or strips them for an empty list.
    pub fn apply_bypass(&self, bypass: &BypassList) -> Vec<SinkError> {
        let assignments = bypass_assignments(bypass);
        self.patch_all(&BYPASS_KEYS, &assignments)
    }

    pub fn remove_all(&self) -> Vec<SinkError> {
        let mut errors = self.patch_all(&PROXY_KEYS, &[]);
        errors.extend(self.patch_all(&BYPASS_KEYS, &[]));
        errors
    }

    fn patch_all(
        &self,
        keys: &[&'static str],
        assignments: &[sysproxy_backend::env::Assignment],
    ) -> Vec<SinkError> {
        let mut errors = Vec::new();
        for shell in &self.shells {
            let set = ManagedLineSet::new(shell.shell_type.dialect(), keys);
            match config::write(&shell.config_path, &set, assignments) {
                Ok(edit) if edit.has_changes() => {
                    info!("Updated {} ({})", shell.config_path.display(), shell.shell_type);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("{} rc file not updated: {e}", shell.shell_type);
                    errors.push(e);
                }
            }
        }
        errors
    }
}

#[async_trait]
impl EnvironmentSink for ShellEnvironmentRegistry {
    fn name(&self) -> &'static str {
        "shell rc files"
    }

    async fn project_proxy(&self, state: &ProxyState) -> Vec<SinkError> {
        self.apply(state)
    }

    async fn project_bypass(&self, bypass: &BypassList) -> Vec<SinkError> {
        self.apply_bypass(bypass)
    }

    async fn clear(&self) -> Vec<SinkError> {
        self.remove_all()
    }
}
