use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
    Ftp,
    Socks,
}

impl Protocol {
    pub const ALL: [Self; 4] = [Self::Http, Self::Https, Self::Ftp, Self::Socks];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Ftp => "ftp",
            Self::Socks => "socks",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            "ftp" => Some(Self::Ftp),
            "socks" | "socks4" | "socks5" => Some(Self::Socks),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("Proxy host must not be empty")]
    EmptyHost,
    #[error("Proxy port must be within 1-65535, got: {0}")]
    InvalidPort(u32),
    #[error("Expected host:port, got: {input}")]
    InvalidEndpoint { input: String },
    #[error("An enabled proxy requires an http endpoint")]
    MissingHttpEndpoint,
    #[error("Unknown proxy protocol: {0}")]
    UnknownProtocol(String),
}

/// A proxy server address. Validated on construction and never mutated after.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawEndpoint")]
pub struct ProxyEndpoint {
    host: String,
    port: u16,
}

#[derive(Deserialize)]
struct RawEndpoint {
    host: String,
    port: u32,
}

impl TryFrom<RawEndpoint> for ProxyEndpoint {
    type Error = StateError;

    fn try_from(raw: RawEndpoint) -> Result<Self, Self::Error> {
        Self::with_port(&raw.host, raw.port)
    }
}

impl ProxyEndpoint {
    pub fn new(host: impl AsRef<str>, port: u16) -> Result<Self, StateError> {
        Self::with_port(host.as_ref(), u32::from(port))
    }

    /// Validates a port read from an untyped store.
    pub fn with_port(host: &str, port: u32) -> Result<Self, StateError> {
        let host = host.trim();
        let host = host
            .strip_prefix('[')
            .and_then(|inner| inner.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(StateError::EmptyHost);
        }
        let port = u16::try_from(port)
            .ok()
            .filter(|port| *port != 0)
            .ok_or(StateError::InvalidPort(port))?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn url(&self, scheme: &str) -> String {
        format!("{scheme}://{self}/")
    }
}

/// IPv6 literals are bracketed so the port stays unambiguous.
impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for ProxyEndpoint {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.split_once("://").map_or(s, |(_, rest)| rest);
        let s = s.trim_end_matches('/');

        let invalid = || StateError::InvalidEndpoint {
            input: s.to_string(),
        };
        let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
        let port: u32 = port.trim().parse().map_err(|_| invalid())?;
        Self::with_port(host, port)
    }
}

pub type Endpoints = BTreeMap<Protocol, ProxyEndpoint>;

/// Hosts that must not be routed through the proxy, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct BypassList(Vec<String>);

impl BypassList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pattern: &str) {
        let pattern = pattern.trim();
        if !pattern.is_empty() && !self.0.iter().any(|existing| existing == pattern) {
            self.0.push(pattern.to_string());
        }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn joined(&self, separator: &str) -> String {
        self.0.join(separator)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for BypassList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = Self::new();
        for pattern in iter {
            list.push(pattern.as_ref());
        }
        list
    }
}

impl From<Vec<String>> for BypassList {
    fn from(patterns: Vec<String>) -> Self {
        patterns.into_iter().collect()
    }
}

impl From<BypassList> for Vec<String> {
    fn from(list: BypassList) -> Self {
        list.0
    }
}

/// One logical proxy configuration, mirrored into every store and sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawState")]
pub struct ProxyState {
    enabled: bool,
    endpoints: Endpoints,
    bypass: BypassList,
}

#[derive(Deserialize)]
struct RawState {
    enabled: bool,
    #[serde(default)]
    endpoints: Endpoints,
    #[serde(default)]
    bypass: BypassList,
}

impl TryFrom<RawState> for ProxyState {
    type Error = StateError;

    fn try_from(raw: RawState) -> Result<Self, Self::Error> {
        Self::new(raw.enabled, raw.endpoints, raw.bypass)
    }
}

impl ProxyState {
    pub fn new(enabled: bool, endpoints: Endpoints, bypass: BypassList) -> Result<Self, StateError> {
        if enabled && !endpoints.contains_key(&Protocol::Http) {
            return Err(StateError::MissingHttpEndpoint);
        }
        Ok(Self {
            enabled,
            endpoints,
            bypass,
        })
    }

    /// The shape written by an engage call: one server for http, https and ftp.
    pub fn uniform(host: &str, port: u16, bypass: BypassList) -> Result<Self, StateError> {
        let endpoint = ProxyEndpoint::new(host, port)?;
        let endpoints = [Protocol::Http, Protocol::Https, Protocol::Ftp]
            .into_iter()
            .map(|protocol| (protocol, endpoint.clone()))
            .collect();
        Self::new(true, endpoints, bypass)
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            endpoints: Endpoints::new(),
            bypass: BypassList::new(),
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    #[must_use]
    pub fn endpoint(&self, protocol: Protocol) -> Option<&ProxyEndpoint> {
        self.endpoints.get(&protocol)
    }

    #[must_use]
    pub fn bypass(&self) -> &BypassList {
        &self.bypass
    }

    #[must_use]
    pub fn with_bypass(mut self, bypass: BypassList) -> Self {
        self.bypass = bypass;
        self
    }
}
