use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use log::{debug, info, warn};
use sysproxy_backend::{BackendError, BypassList, Endpoints, Protocol, ProxyBackend, ProxyEndpoint};

use crate::server::{format_proxy_server, parse_proxy_server};
use crate::store::{RegValue, SettingsStore};

pub const INTERNET_SETTINGS_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Internet Settings";

const PROXY_ENABLE: &str = "ProxyEnable";
const PROXY_SERVER: &str = "ProxyServer";
const PROXY_OVERRIDE: &str = "ProxyOverride";
const LOCAL_OVERRIDE: &str = "<local>";

/// WinINet proxy settings under `HKCU\...\Internet Settings`.
pub struct WindowsBackend {
    store: Mutex<Box<dyn SettingsStore>>,
}

impl WindowsBackend {
    /// Opens the current user's Internet Settings key for the lifetime of the
    /// backend.
    pub fn open() -> Result<Self, BackendError> {
        #[cfg(windows)]
        {
            let store = crate::registry::RegistryStore::open(INTERNET_SETTINGS_KEY)?;
            Ok(Self::with_store(Box::new(store)))
        }
        #[cfg(not(windows))]
        {
            Err(BackendError::unsupported(
                "the Windows registry is only available on Windows",
            ))
        }
    }

    #[must_use]
    pub fn with_store(store: Box<dyn SettingsStore>) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    fn read(&self, name: &str) -> Result<Option<RegValue>, BackendError> {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
    }

    /// Writes `value`, keeping the type of an existing value.
    fn write(&self, name: &str, value: RegValue) -> Result<(), BackendError> {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        let value = match store.get(name)? {
            Some(existing) => value.coerce_to(&existing),
            None => value,
        };
        debug!("{name} = {}", value.to_text());
        store.set(name, value)
    }

    fn read_text(&self, name: &str) -> Result<String, BackendError> {
        Ok(self
            .read(name)?
            .map(|value| value.to_text())
            .unwrap_or_default())
    }

    fn read_endpoints(&self) -> Result<Endpoints, BackendError> {
        let raw = self.read_text(PROXY_SERVER)?;
        parse_proxy_server(&raw).ok_or_else(|| BackendError::malformed(PROXY_SERVER, raw))
    }
}

#[async_trait]
impl ProxyBackend for WindowsBackend {
    fn name(&self) -> &'static str {
        "Windows"
    }

    async fn get_enabled(&self) -> bool {
        match self.read(PROXY_ENABLE) {
            Ok(value) => value.and_then(|value| value.as_u32()) == Some(1),
            Err(e) => {
                warn!("Reading {PROXY_ENABLE} failed: {e}");
                false
            }
        }
    }

    async fn set_enabled(&self, enabled: bool) -> Result<(), BackendError> {
        self.write(PROXY_ENABLE, RegValue::Dword(u32::from(enabled)))
    }

    async fn set_endpoint(
        &self,
        protocol: Protocol,
        endpoint: &ProxyEndpoint,
    ) -> Result<(), BackendError> {
        let mut endpoints = self.read_endpoints().unwrap_or_else(|e| {
            warn!("Replacing unreadable {PROXY_SERVER}: {e}");
            Endpoints::new()
        });
        endpoints.insert(protocol, endpoint.clone());
        self.write(PROXY_SERVER, RegValue::String(format_proxy_server(&endpoints)))
    }

    async fn clear_endpoint(&self, protocol: Protocol) -> Result<(), BackendError> {
        let mut endpoints = self.read_endpoints().unwrap_or_else(|e| {
            warn!("Replacing unreadable {PROXY_SERVER}: {e}");
            Endpoints::new()
        });
        if endpoints.remove(&protocol).is_none() {
            return Ok(());
        }
        self.write(PROXY_SERVER, RegValue::String(format_proxy_server(&endpoints)))
    }

    async fn get_endpoints(&self) -> Result<Endpoints, BackendError> {
        self.read_endpoints()
    }

    /// One `ProxyServer` write replaces every protocol at once.
    async fn set_endpoints(&self, endpoints: &Endpoints) -> Result<(), BackendError> {
        self.write(PROXY_SERVER, RegValue::String(format_proxy_server(endpoints)))
    }

    async fn set_bypass_domains(&self, domains: &BypassList) -> Result<(), BackendError> {
        self.write(PROXY_OVERRIDE, RegValue::String(domains.joined(";")))
    }

    async fn get_bypass_domains(&self) -> Result<BypassList, BackendError> {
        Ok(self.read_text(PROXY_OVERRIDE)?.split(';').collect())
    }

    async fn teardown(&self) -> Result<(), BackendError> {
        info!("Resetting Windows proxy settings");
        self.write(PROXY_ENABLE, RegValue::Dword(0))?;
        self.write(PROXY_SERVER, RegValue::String(String::new()))?;
        self.write(PROXY_OVERRIDE, RegValue::String(LOCAL_OVERRIDE.to_string()))
    }

    async fn notify_change(&self) -> Result<(), BackendError> {
        #[cfg(windows)]
        {
            use windows_sys::Win32::Networking::WinInet::{
                INTERNET_OPTION_REFRESH, INTERNET_OPTION_SETTINGS_CHANGED, InternetSetOptionW,
            };

            for option in [INTERNET_OPTION_SETTINGS_CHANGED, INTERNET_OPTION_REFRESH] {
                let ok = unsafe {
                    InternetSetOptionW(std::ptr::null(), option, std::ptr::null(), 0)
                };
                if ok == 0 {
                    return Err(BackendError::command(
                        "InternetSetOptionW",
                        format!("option {option}: {}", std::io::Error::last_os_error()),
                    ));
                }
            }
            debug!("Broadcast Internet Settings change");
        }
        Ok(())
    }
}
