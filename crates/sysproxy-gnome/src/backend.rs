use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use sysproxy_backend::{BackendError, BypassList, Endpoints, Protocol, ProxyBackend, ProxyEndpoint};
use sysproxy_platform::{CommandRunner, args};

use crate::variant;

pub const SCHEMA: &str = "org.gnome.system.proxy";
const PROGRAM: &str = "gsettings";

/// Proxy settings in the GNOME `org.gnome.system.proxy` schema.
pub struct GnomeBackend {
    runner: Arc<dyn CommandRunner>,
}

impl GnomeBackend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Result<Self, BackendError> {
        if !runner.is_installed(PROGRAM) {
            return Err(BackendError::unsupported("gsettings is not installed"));
        }
        Ok(Self { runner })
    }

    fn child_schema(protocol: Protocol) -> String {
        format!("{SCHEMA}.{}", protocol.as_str())
    }

    async fn gsettings(
        &self,
        action: &str,
        schema: &str,
        key: &str,
        value: Option<&str>,
    ) -> Result<String, BackendError> {
        let target = format!("{schema} {key}");
        let mut call = args([action, schema, key]);
        call.extend(value.map(str::to_string));

        let output = self
            .runner
            .run(PROGRAM, &call)
            .await
            .map_err(|e| BackendError::command(&target, e.to_string()))?;
        if !output.success {
            error!("gsettings {action} {target} failed: {}", output.failure_details());
            return Err(BackendError::command(target, output.failure_details()));
        }
        Ok(output.stdout)
    }

    async fn get(&self, schema: &str, key: &str) -> Result<String, BackendError> {
        self.gsettings("get", schema, key, None).await
    }

    async fn set(&self, schema: &str, key: &str, value: &str) -> Result<(), BackendError> {
        debug!("gsettings set {schema} {key} {value}");
        self.gsettings("set", schema, key, Some(value)).await.map(drop)
    }

    async fn reset(&self, schema: &str, key: &str) -> Result<(), BackendError> {
        self.gsettings("reset", schema, key, None).await.map(drop)
    }

    async fn read_endpoint(
        &self,
        protocol: Protocol,
    ) -> Result<Option<ProxyEndpoint>, BackendError> {
        let schema = Self::child_schema(protocol);
        let host = variant::unquote(&self.get(&schema, "host").await?);
        let raw_port = self.get(&schema, "port").await?;
        let port = variant::parse_int(&raw_port)
            .ok_or_else(|| BackendError::malformed(format!("{schema} port"), raw_port.trim()))?;

        if host.is_empty() || port == 0 {
            return Ok(None);
        }
        ProxyEndpoint::with_port(&host, port)
            .map(Some)
            .map_err(|_| BackendError::malformed(format!("{schema} port"), port.to_string()))
    }
}

#[async_trait]
impl ProxyBackend for GnomeBackend {
    fn name(&self) -> &'static str {
        "GNOME"
    }

    async fn get_enabled(&self) -> bool {
        match self.get(SCHEMA, "mode").await {
            Ok(mode) => variant::unquote(&mode) == "manual",
            Err(e) => {
                warn!("Reading GNOME proxy mode failed: {e}");
                false
            }
        }
    }

    async fn set_enabled(&self, enabled: bool) -> Result<(), BackendError> {
        let mode = if enabled { "manual" } else { "none" };
        self.set(SCHEMA, "mode", &variant::quote(mode)).await
    }

    async fn set_endpoint(
        &self,
        protocol: Protocol,
        endpoint: &ProxyEndpoint,
    ) -> Result<(), BackendError> {
        let schema = Self::child_schema(protocol);
        self.set(&schema, "host", &variant::quote(endpoint.host()))
            .await?;
        self.set(&schema, "port", &endpoint.port().to_string()).await
    }

    async fn clear_endpoint(&self, protocol: Protocol) -> Result<(), BackendError> {
        let schema = Self::child_schema(protocol);
        self.reset(&schema, "host").await?;
        self.reset(&schema, "port").await
    }

    async fn get_endpoints(&self) -> Result<Endpoints, BackendError> {
        let mut endpoints = Endpoints::new();
        for protocol in Protocol::ALL {
            if let Some(endpoint) = self.read_endpoint(protocol).await? {
                endpoints.insert(protocol, endpoint);
            }
        }
        Ok(endpoints)
    }

    async fn set_bypass_domains(&self, domains: &BypassList) -> Result<(), BackendError> {
        let encoded = variant::encode_string_array(domains.iter());
        self.set(SCHEMA, "ignore-hosts", &encoded).await
    }

    async fn get_bypass_domains(&self) -> Result<BypassList, BackendError> {
        let raw = self.get(SCHEMA, "ignore-hosts").await?;
        variant::decode_string_array(&raw)
            .map(BypassList::from)
            .ok_or_else(|| BackendError::malformed(format!("{SCHEMA} ignore-hosts"), raw.trim()))
    }

    async fn teardown(&self) -> Result<(), BackendError> {
        info!("Resetting GNOME proxy settings");
        self.set_enabled(false).await?;
        for protocol in Protocol::ALL {
            self.clear_endpoint(protocol).await?;
        }
        self.reset(SCHEMA, "ignore-hosts").await
    }
}
