use async_trait::async_trait;

use crate::error::{BackendError, SinkError};
use crate::types::{BypassList, Endpoints, Protocol, ProxyEndpoint, ProxyState};

/// The OS-native proxy store for one platform or desktop.
#[async_trait]
pub trait ProxyBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Reports `false` when the store is unset or unreadable.
    async fn get_enabled(&self) -> bool;

    async fn set_enabled(&self, enabled: bool) -> Result<(), BackendError>;

    async fn set_endpoint(
        &self,
        protocol: Protocol,
        endpoint: &ProxyEndpoint,
    ) -> Result<(), BackendError>;

    /// Removes whatever server is stored for `protocol`.
    async fn clear_endpoint(&self, protocol: Protocol) -> Result<(), BackendError>;

    async fn get_endpoints(&self) -> Result<Endpoints, BackendError>;

    /// Makes the stored servers exactly `endpoints`; protocols missing from
    /// the map are cleared.
    async fn set_endpoints(&self, endpoints: &Endpoints) -> Result<(), BackendError> {
        for protocol in Protocol::ALL {
            match endpoints.get(&protocol) {
                Some(endpoint) => self.set_endpoint(protocol, endpoint).await?,
                None => self.clear_endpoint(protocol).await?,
            }
        }
        Ok(())
    }

    async fn set_bypass_domains(&self, domains: &BypassList) -> Result<(), BackendError>;

    async fn get_bypass_domains(&self) -> Result<BypassList, BackendError>;

    /// Replaces the stored servers and the bypass list before touching the
    /// enable flag, so the store never reports an enabled proxy without a
    /// server or with a stale one.
    async fn apply_all(&self, state: &ProxyState) -> Result<(), BackendError> {
        self.set_endpoints(state.endpoints()).await?;
        self.set_bypass_domains(state.bypass()).await?;
        self.set_enabled(state.enabled()).await
    }

    /// Disables the proxy and restores the platform defaults.
    async fn teardown(&self) -> Result<(), BackendError>;

    async fn notify_change(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// A derived, write-only projection of the proxy state.
///
/// Failures are returned per target file or command so one broken sink never
/// blocks the others.
#[async_trait]
pub trait EnvironmentSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn project_proxy(&self, state: &ProxyState) -> Vec<SinkError>;

    async fn project_bypass(&self, bypass: &BypassList) -> Vec<SinkError>;

    async fn clear(&self) -> Vec<SinkError>;
}
