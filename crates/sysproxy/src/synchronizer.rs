use std::sync::Arc;

use log::{info, warn};
use sysproxy_backend::{
    BypassList, EnvironmentSink, Protocol, ProxyBackend, ProxyEndpoint, ProxyState, SinkError,
    StateError,
};
use sysproxy_platform::{CommandRunner, HostEnvironment, SystemRunner};

use crate::error::SyncError;
use crate::select::{detect_backend, detect_sinks};
use crate::settings::SyncSettings;

/// Sink failures collected while the backend steps succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub sink_failures: Vec<SinkError>,
}

impl SyncReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.sink_failures.is_empty()
    }

    fn absorb(&mut self, sink: &str, errors: Vec<SinkError>) {
        for error in &errors {
            warn!("{sink}: {error}");
        }
        self.sink_failures.extend(errors);
    }
}

/// Keeps one native proxy store and every derived sink in step.
///
/// Each operation runs its steps strictly in sequence: the backend first,
/// then the sinks. A backend failure stops the sequence and is returned;
/// sink failures are collected into the [`SyncReport`].
pub struct ProxySynchronizer {
    backend: Box<dyn ProxyBackend>,
    sinks: Vec<Box<dyn EnvironmentSink>>,
}

impl ProxySynchronizer {
    #[must_use]
    pub fn new(backend: Box<dyn ProxyBackend>, sinks: Vec<Box<dyn EnvironmentSink>>) -> Self {
        Self { backend, sinks }
    }

    /// Builds the synchronizer for the running host.
    pub fn detect(settings: &SyncSettings) -> Result<Self, SyncError> {
        let host = HostEnvironment::current();
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
        let backend = detect_backend(host, runner.clone(), settings)?;
        let sinks = detect_sinks(host, runner, settings);
        Ok(Self::new(backend, sinks))
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    #[must_use]
    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|sink| sink.name()).collect()
    }

    /// Points every protocol at `host:port` and enables the proxy. An empty
    /// `bypass` keeps the list already stored by the backend.
    pub async fn engage(
        &self,
        host: &str,
        port: u16,
        bypass: BypassList,
    ) -> Result<SyncReport, SyncError> {
        info!("Engaging proxy {host}:{port} via {}", self.backend.name());

        let bypass = if bypass.is_empty() {
            self.stored_bypass().await
        } else {
            bypass
        };
        let state = ProxyState::uniform(host, port, bypass)?;

        self.backend.apply_all(&state).await?;
        self.notify().await;

        let mut report = SyncReport::default();
        self.project(&state, &mut report).await;
        Ok(report)
    }

    /// Stores `host:port` for every protocol without touching the enable
    /// flag. Sinks follow only when the proxy is already on.
    pub async fn configure(&self, host: &str, port: u16) -> Result<SyncReport, SyncError> {
        info!("Configuring proxy {host}:{port} via {}", self.backend.name());

        let endpoint = ProxyEndpoint::new(host, port)?;
        for protocol in [Protocol::Http, Protocol::Https, Protocol::Ftp] {
            self.backend.set_endpoint(protocol, &endpoint).await?;
        }
        self.notify().await;

        let mut report = SyncReport::default();
        if self.backend.get_enabled().await {
            let state = ProxyState::uniform(host, port, BypassList::new())?;
            for sink in &self.sinks {
                report.absorb(sink.name(), sink.project_proxy(&state).await);
            }
        }
        Ok(report)
    }

    /// Restores the platform defaults and strips every managed sink entry.
    ///
    /// Sinks are cleared even when the backend teardown fails, so no stale
    /// exports survive a partial failure; the backend error is still returned.
    pub async fn disengage(&self) -> Result<SyncReport, SyncError> {
        info!("Disengaging proxy via {}", self.backend.name());

        let teardown = self.backend.teardown().await;
        match &teardown {
            Ok(()) => self.notify().await,
            Err(e) => warn!("{} teardown failed: {e}", self.backend.name()),
        }

        let mut report = SyncReport::default();
        self.clear_sinks(&mut report).await;

        teardown?;
        Ok(report)
    }

    /// Flips the enable flag. Enabling needs a stored http endpoint and
    /// fails before any write without one.
    pub async fn set_enabled(&self, enabled: bool) -> Result<SyncReport, SyncError> {
        info!("Setting proxy enabled={enabled} via {}", self.backend.name());

        let mut report = SyncReport::default();
        if !enabled {
            self.backend.set_enabled(false).await?;
            self.notify().await;
            self.clear_sinks(&mut report).await;
            return Ok(report);
        }

        let endpoints = self.backend.get_endpoints().await?;
        if !endpoints.contains_key(&Protocol::Http) {
            return Err(StateError::MissingHttpEndpoint.into());
        }
        let state = ProxyState::new(true, endpoints, self.stored_bypass().await)?;

        self.backend.set_enabled(true).await?;
        self.notify().await;
        self.project(&state, &mut report).await;
        Ok(report)
    }

    /// Replaces the bypass list. The bypass sinks are only rewritten while
    /// the proxy is enabled, so a disabled host keeps clean sinks.
    pub async fn set_bypass_domains(&self, domains: BypassList) -> Result<SyncReport, SyncError> {
        info!(
            "Setting {} bypass domain(s) via {}",
            domains.len(),
            self.backend.name()
        );

        self.backend.set_bypass_domains(&domains).await?;
        self.notify().await;

        let mut report = SyncReport::default();
        if self.backend.get_enabled().await {
            for sink in &self.sinks {
                report.absorb(sink.name(), sink.project_bypass(&domains).await);
            }
        }
        Ok(report)
    }

    pub async fn bypass_domains(&self) -> Result<BypassList, SyncError> {
        Ok(self.backend.get_bypass_domains().await?)
    }

    pub async fn enabled(&self) -> bool {
        self.backend.get_enabled().await
    }

    /// Reads the state back from the backend alone; sinks are never consulted.
    pub async fn proxy_state(&self) -> Result<ProxyState, SyncError> {
        let mut enabled = self.backend.get_enabled().await;
        let endpoints = self.backend.get_endpoints().await?;
        let bypass = self.backend.get_bypass_domains().await?;

        if enabled && !endpoints.contains_key(&Protocol::Http) {
            warn!(
                "{} reports an enabled proxy without an http server, treating it as disabled",
                self.backend.name()
            );
            enabled = false;
        }
        Ok(ProxyState::new(enabled, endpoints, bypass)?)
    }

    async fn stored_bypass(&self) -> BypassList {
        self.backend.get_bypass_domains().await.unwrap_or_else(|e| {
            warn!("Could not read the current bypass list: {e}");
            BypassList::new()
        })
    }

    async fn notify(&self) {
        if let Err(e) = self.backend.notify_change().await {
            warn!("{} change notification failed: {e}", self.backend.name());
        }
    }

    async fn project(&self, state: &ProxyState, report: &mut SyncReport) {
        for sink in &self.sinks {
            report.absorb(sink.name(), sink.project_proxy(state).await);
            report.absorb(sink.name(), sink.project_bypass(state.bypass()).await);
        }
    }

    async fn clear_sinks(&self, report: &mut SyncReport) {
        for sink in &self.sinks {
            report.absorb(sink.name(), sink.clear().await);
        }
    }
}
