use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use sysproxy_backend::{BackendError, BypassList, Endpoints, Protocol, ProxyBackend, ProxyEndpoint};
use sysproxy_platform::{CommandOutput, CommandRunner, args};

use crate::services::{
    NetworkService, ProxyInfo, parse_bypass_domains, parse_default_interface,
    parse_network_services, parse_proxy_info, service_for_device,
};

const PROGRAM: &str = "networksetup";
const DEFAULT_BYPASS: [&str; 2] = ["*.local", "169.254/16"];

/// Per-network-service proxy settings through `networksetup`.
///
/// Writes go to every service so switching networks keeps the proxy; reads
/// come from the service behind the default route.
pub struct MacosBackend {
    runner: Arc<dyn CommandRunner>,
}

fn flag(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::Http => "webproxy",
        Protocol::Https => "securewebproxy",
        Protocol::Ftp => "ftpproxy",
        Protocol::Socks => "socksfirewallproxy",
    }
}

impl MacosBackend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Result<Self, BackendError> {
        if !runner.is_installed(PROGRAM) {
            return Err(BackendError::unsupported("networksetup is not installed"));
        }
        Ok(Self { runner })
    }

    async fn call(
        &self,
        program: &str,
        arguments: Vec<String>,
    ) -> Result<CommandOutput, BackendError> {
        self.runner.run(program, &arguments).await.map_err(|e| {
            BackendError::command(format!("{program} {}", arguments.join(" ")), e.to_string())
        })
    }

    /// Runs `networksetup`, attributing failures to `target`.
    async fn networksetup(
        &self,
        target: &str,
        arguments: Vec<String>,
    ) -> Result<String, BackendError> {
        let output = self.call(PROGRAM, arguments).await?;
        if !output.success {
            error!("networksetup failed for {target}: {}", output.failure_details());
            return Err(BackendError::command(target, output.failure_details()));
        }
        Ok(output.stdout)
    }

    pub async fn network_services(&self) -> Result<Vec<NetworkService>, BackendError> {
        let output = self
            .networksetup(PROGRAM, args(["-listallnetworkservices"]))
            .await?;
        Ok(parse_network_services(&output))
    }

    async fn service_names(&self) -> Result<Vec<String>, BackendError> {
        Ok(self
            .network_services()
            .await?
            .into_iter()
            .map(|service| service.name)
            .collect())
    }

    /// The service behind the default route, or the first enabled service
    /// when the host is offline or the route's device has no service.
    pub async fn default_network_service(&self) -> Result<String, BackendError> {
        let route = self.call("route", args(["-n", "get", "default"])).await?;
        let device = parse_default_interface(&format!("{}\n{}", route.stdout, route.stderr));

        if let Some(device) = device {
            let ports = self
                .networksetup(PROGRAM, args(["-listallhardwareports"]))
                .await?;
            if let Some(service) = service_for_device(&ports, &device) {
                debug!("Default network service: {service} ({device})");
                return Ok(service);
            }
            warn!("No network service for default device {device}");
        } else {
            debug!("No default route, using the first enabled network service");
        }

        self.network_services()
            .await?
            .into_iter()
            .find(|service| service.enabled)
            .map(|service| service.name)
            .ok_or_else(|| BackendError::command(PROGRAM, "no enabled network service found"))
    }

    pub async fn proxy_info(
        &self,
        service: &str,
        protocol: Protocol,
    ) -> Result<ProxyInfo, BackendError> {
        let arguments = args([format!("-get{}", flag(protocol)), service.to_string()]);
        let output = self.networksetup(service, arguments).await?;
        Ok(parse_proxy_info(&output))
    }

    async fn set_state(
        &self,
        service: &str,
        protocol: Protocol,
        on: bool,
    ) -> Result<(), BackendError> {
        let state = if on { "on" } else { "off" };
        let arguments = args([
            format!("-set{}state", flag(protocol)),
            service.to_string(),
            state.to_string(),
        ]);
        self.networksetup(service, arguments).await.map(drop)
    }

    async fn set_server(
        &self,
        service: &str,
        protocol: Protocol,
        host: &str,
        port: &str,
    ) -> Result<(), BackendError> {
        let arguments = args([
            format!("-set{}", flag(protocol)),
            service.to_string(),
            host.to_string(),
            port.to_string(),
        ]);
        self.networksetup(service, arguments).await.map(drop)
    }

    async fn set_bypass(&self, service: &str, domains: &[&str]) -> Result<(), BackendError> {
        let mut call = args(["-setproxybypassdomains", service]);
        if domains.is_empty() {
            call.push("Empty".to_string());
        } else {
            call.extend(domains.iter().map(|domain| (*domain).to_string()));
        }
        self.networksetup(service, call).await.map(drop)
    }
}

#[async_trait]
impl ProxyBackend for MacosBackend {
    fn name(&self) -> &'static str {
        "macOS"
    }

    async fn get_enabled(&self) -> bool {
        let read = async {
            let service = self.default_network_service().await?;
            let http = self.proxy_info(&service, Protocol::Http).await?;
            let https = self.proxy_info(&service, Protocol::Https).await?;
            Ok::<_, BackendError>(http.enabled && https.enabled)
        };
        read.await.unwrap_or_else(|e| {
            warn!("Reading macOS proxy state failed: {e}");
            false
        })
    }

    async fn set_enabled(&self, enabled: bool) -> Result<(), BackendError> {
        for service in self.service_names().await? {
            for protocol in Protocol::ALL {
                let on = match protocol {
                    _ if !enabled => false,
                    Protocol::Http | Protocol::Https => true,
                    Protocol::Ftp | Protocol::Socks => {
                        self.proxy_info(&service, protocol).await?.is_configured()
                    }
                };
                self.set_state(&service, protocol, on).await?;
            }
        }
        Ok(())
    }

    async fn set_endpoint(
        &self,
        protocol: Protocol,
        endpoint: &ProxyEndpoint,
    ) -> Result<(), BackendError> {
        for service in self.service_names().await? {
            let before = self.proxy_info(&service, protocol).await?;
            self.set_server(&service, protocol, endpoint.host(), &endpoint.port().to_string())
                .await?;
            // Setting the server switches the proxy on.
            if !before.enabled {
                self.set_state(&service, protocol, false).await?;
            }
        }
        Ok(())
    }

    async fn clear_endpoint(&self, protocol: Protocol) -> Result<(), BackendError> {
        for service in self.service_names().await? {
            if self.proxy_info(&service, protocol).await?.is_configured() {
                self.set_server(&service, protocol, "", "0").await?;
            }
            self.set_state(&service, protocol, false).await?;
        }
        Ok(())
    }

    async fn get_endpoints(&self) -> Result<Endpoints, BackendError> {
        let service = self.default_network_service().await?;
        let mut endpoints = Endpoints::new();
        for protocol in Protocol::ALL {
            let info = self.proxy_info(&service, protocol).await?;
            if !info.is_configured() {
                continue;
            }
            let endpoint = ProxyEndpoint::with_port(&info.server, info.port).map_err(|_| {
                BackendError::malformed(&service, format!("{}:{}", info.server, info.port))
            })?;
            endpoints.insert(protocol, endpoint);
        }
        Ok(endpoints)
    }

    async fn set_bypass_domains(&self, domains: &BypassList) -> Result<(), BackendError> {
        let domains: Vec<&str> = domains.iter().collect();
        for service in self.service_names().await? {
            self.set_bypass(&service, &domains).await?;
        }
        Ok(())
    }

    async fn get_bypass_domains(&self) -> Result<BypassList, BackendError> {
        let service = self.default_network_service().await?;
        let output = self
            .networksetup(&service, args(["-getproxybypassdomains", service.as_str()]))
            .await?;
        Ok(parse_bypass_domains(&output).into())
    }

    async fn teardown(&self) -> Result<(), BackendError> {
        info!("Resetting macOS proxy settings");
        for service in self.service_names().await? {
            for protocol in Protocol::ALL {
                self.set_server(&service, protocol, "", "0").await?;
                self.set_state(&service, protocol, false).await?;
            }
            self.set_bypass(&service, &DEFAULT_BYPASS).await?;
        }
        Ok(())
    }
}
