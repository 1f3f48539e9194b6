use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use sysproxy_backend::{
    BackendError, BypassList, Endpoints, Protocol, ProxyBackend, ProxyEndpoint,
};
use sysproxy_gnome::GnomeBackend;
use sysproxy_platform::{CommandRunner, args};

const FILE: &str = "kioslaverc";
pub const GROUP: &str = "Proxy Settings";
pub const DEFAULT_NO_PROXY_FOR: &str = "localhost,127.0.0.0/8,::1";

/// Proxy settings in KDE's `kioslaverc`, optionally mirrored into the GNOME
/// store for GTK applications running under Plasma.
pub struct KdeBackend {
    runner: Arc<dyn CommandRunner>,
    read_command: String,
    write_command: String,
    mirror: Option<GnomeBackend>,
}

impl KdeBackend {
    /// `version` is the `KDE_SESSION_VERSION` suffix of the config tools.
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        version: &str,
        mirror_to_gsettings: bool,
    ) -> Result<Self, BackendError> {
        let read_command = format!("kreadconfig{version}");
        let write_command = format!("kwriteconfig{version}");
        for command in [&read_command, &write_command] {
            if !runner.is_installed(command) {
                return Err(BackendError::unsupported(format!("{command} is not installed")));
            }
        }

        let mirror = if mirror_to_gsettings {
            GnomeBackend::new(runner.clone()).ok()
        } else {
            None
        };
        if mirror.is_some() {
            debug!("Mirroring KDE proxy settings into gsettings");
        }

        Ok(Self {
            runner,
            read_command,
            write_command,
            mirror,
        })
    }

    pub fn detect(
        runner: Arc<dyn CommandRunner>,
        mirror_to_gsettings: bool,
    ) -> Result<Self, BackendError> {
        Self::new(
            runner,
            &sysproxy_platform::kde_session_version(),
            mirror_to_gsettings,
        )
    }

    #[must_use]
    pub fn mirrors_gsettings(&self) -> bool {
        self.mirror.is_some()
    }

    fn key(protocol: Protocol) -> &'static str {
        match protocol {
            Protocol::Http => "httpProxy",
            Protocol::Https => "httpsProxy",
            Protocol::Ftp => "ftpProxy",
            Protocol::Socks => "socksProxy",
        }
    }

    fn scheme(protocol: Protocol) -> &'static str {
        match protocol {
            Protocol::Http | Protocol::Https => "http",
            Protocol::Ftp => "ftp",
            Protocol::Socks => "socks",
        }
    }

    async fn config(
        &self,
        program: &str,
        key: &str,
        value: Option<&str>,
    ) -> Result<String, BackendError> {
        let mut call = args(["--file", FILE, "--group", GROUP, "--key", key]);
        call.extend(value.map(str::to_string));

        let output = self
            .runner
            .run(program, &call)
            .await
            .map_err(|e| BackendError::command(key, e.to_string()))?;
        if !output.success {
            error!("{program} {key} failed: {}", output.failure_details());
            return Err(BackendError::command(key, output.failure_details()));
        }
        Ok(output.stdout.trim().to_string())
    }

    async fn read(&self, key: &str) -> Result<String, BackendError> {
        self.config(&self.read_command, key, None).await
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), BackendError> {
        debug!("{} {key}={value}", self.write_command);
        self.config(&self.write_command, key, Some(value)).await.map(drop)
    }
}

/// Parses `scheme://host port` as written by the settings dialog, or the
/// `scheme://host:port` form some distributions ship.
fn parse_proxy_value(key: &str, raw: &str) -> Result<Option<ProxyEndpoint>, BackendError> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }
    let malformed = || BackendError::malformed(key, value);

    let address = value.split_once("://").map_or(value, |(_, rest)| rest);
    let endpoint = match address.split_once(char::is_whitespace) {
        Some((host, port)) => {
            let port = port.trim().parse::<u32>().map_err(|_| malformed())?;
            ProxyEndpoint::with_port(host, port)
        }
        None => address.parse(),
    };
    endpoint.map(Some).map_err(|_| malformed())
}

#[async_trait]
impl ProxyBackend for KdeBackend {
    fn name(&self) -> &'static str {
        "KDE"
    }

    async fn get_enabled(&self) -> bool {
        match self.read("ProxyType").await {
            Ok(value) => value == "1",
            Err(e) => {
                warn!("Reading KDE ProxyType failed: {e}");
                false
            }
        }
    }

    async fn set_enabled(&self, enabled: bool) -> Result<(), BackendError> {
        self.write("ProxyType", if enabled { "1" } else { "0" }).await?;
        if let Some(mirror) = &self.mirror {
            mirror.set_enabled(enabled).await?;
        }
        Ok(())
    }

    async fn set_endpoint(
        &self,
        protocol: Protocol,
        endpoint: &ProxyEndpoint,
    ) -> Result<(), BackendError> {
        let value = format!(
            "{}://{} {}",
            Self::scheme(protocol),
            endpoint.host(),
            endpoint.port()
        );
        self.write(Self::key(protocol), &value).await?;
        if let Some(mirror) = &self.mirror {
            mirror.set_endpoint(protocol, endpoint).await?;
        }
        Ok(())
    }

    async fn clear_endpoint(&self, protocol: Protocol) -> Result<(), BackendError> {
        self.write(Self::key(protocol), "").await?;
        if let Some(mirror) = &self.mirror {
            mirror.clear_endpoint(protocol).await?;
        }
        Ok(())
    }

    async fn get_endpoints(&self) -> Result<Endpoints, BackendError> {
        let mut endpoints = Endpoints::new();
        for protocol in Protocol::ALL {
            let key = Self::key(protocol);
            if let Some(endpoint) = parse_proxy_value(key, &self.read(key).await?)? {
                endpoints.insert(protocol, endpoint);
            }
        }
        Ok(endpoints)
    }

    async fn set_bypass_domains(&self, domains: &BypassList) -> Result<(), BackendError> {
        self.write("NoProxyFor", &domains.joined(",")).await?;
        if let Some(mirror) = &self.mirror {
            mirror.set_bypass_domains(domains).await?;
        }
        Ok(())
    }

    async fn get_bypass_domains(&self) -> Result<BypassList, BackendError> {
        let raw = self.read("NoProxyFor").await?;
        Ok(raw.split(',').collect())
    }

    async fn teardown(&self) -> Result<(), BackendError> {
        info!("Resetting KDE proxy settings");
        self.write("ProxyType", "0").await?;
        for protocol in Protocol::ALL {
            self.write(Self::key(protocol), "").await?;
        }
        self.write("NoProxyFor", DEFAULT_NO_PROXY_FOR).await?;
        if let Some(mirror) = &self.mirror {
            mirror.teardown().await?;
        }
        Ok(())
    }
}
