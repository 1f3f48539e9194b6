use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use sysproxy_backend::env::{
    Assignment, BYPASS_KEYS, PROXY_KEYS, bypass_assignments, proxy_assignments,
};
use sysproxy_backend::{BypassList, EnvironmentSink, ProxyState, SinkError};
use sysproxy_platform::{CommandRunner, args};

const SINK: &str = "user environment";

/// Persists proxy variables into the user environment with `setx`, so new
/// console sessions inherit them.
pub struct WindowsEnvironmentSink {
    runner: Arc<dyn CommandRunner>,
}

impl WindowsEnvironmentSink {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn setx(&self, key: &str, value: &str) -> Option<SinkError> {
        debug!("setx {key}");
        let details = match self.runner.run("setx", &args([key, value])).await {
            Ok(output) if output.success => return None,
            Ok(output) => output.failure_details(),
            Err(e) => e.to_string(),
        };
        warn!("setx {key} failed: {details}");
        Some(SinkError::CommandFailed {
            sink: SINK,
            details: format!("{key}: {details}"),
        })
    }

    /// Sets every assigned key and clears the rest of `keys`.
    async fn replace(&self, keys: &[&'static str], assignments: &[Assignment]) -> Vec<SinkError> {
        let mut errors = Vec::new();
        for key in keys {
            let value = assignments
                .iter()
                .find(|(assigned, _)| assigned == key)
                .map_or("", |(_, value)| value.as_str());
            errors.extend(self.setx(key, value).await);
        }
        errors
    }
}

#[async_trait]
impl EnvironmentSink for WindowsEnvironmentSink {
    fn name(&self) -> &'static str {
        SINK
    }

    async fn project_proxy(&self, state: &ProxyState) -> Vec<SinkError> {
        self.replace(&PROXY_KEYS, &proxy_assignments(state)).await
    }

    async fn project_bypass(&self, bypass: &BypassList) -> Vec<SinkError> {
        self.replace(&BYPASS_KEYS, &bypass_assignments(bypass)).await
    }

    async fn clear(&self) -> Vec<SinkError> {
        let mut errors = self.replace(&PROXY_KEYS, &[]).await;
        errors.extend(self.replace(&BYPASS_KEYS, &[]).await);
        errors
    }
}
