//! The `ProxyServer` value: `host:port` for every protocol, or
//! `http=host:port;https=host:port;...`.

use log::warn;
use sysproxy_backend::{Endpoints, Protocol, ProxyEndpoint};

/// Parses a `ProxyServer` value, skipping entries it cannot read.
///
/// Returns `None` when the value is non-empty but no entry was usable.
#[must_use]
pub fn parse_proxy_server(raw: &str) -> Option<Endpoints> {
    let mut endpoints = Endpoints::new();
    let mut seen_entry = false;

    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        seen_entry = true;
        match entry.split_once('=') {
            Some((name, address)) => {
                let Some(protocol) = Protocol::from_name(name.trim()) else {
                    warn!("Skipping ProxyServer entry with unknown protocol: {entry}");
                    continue;
                };
                match address.parse::<ProxyEndpoint>() {
                    Ok(endpoint) => {
                        endpoints.insert(protocol, endpoint);
                    }
                    Err(e) => warn!("Skipping ProxyServer entry {entry}: {e}"),
                }
            }
            None => match entry.parse::<ProxyEndpoint>() {
                Ok(endpoint) => {
                    for protocol in [Protocol::Http, Protocol::Https, Protocol::Ftp] {
                        endpoints.entry(protocol).or_insert_with(|| endpoint.clone());
                    }
                }
                Err(e) => warn!("Skipping ProxyServer entry {entry}: {e}"),
            },
        }
    }

    if seen_entry && endpoints.is_empty() {
        None
    } else {
        Some(endpoints)
    }
}

/// Serializes `endpoints`, collapsing to the bare form when http, https and
/// ftp share one server and no socks server is set.
#[must_use]
pub fn format_proxy_server(endpoints: &Endpoints) -> String {
    let uniform = endpoints.get(&Protocol::Http).filter(|http| {
        !endpoints.contains_key(&Protocol::Socks)
            && endpoints.get(&Protocol::Https) == Some(*http)
            && endpoints.get(&Protocol::Ftp) == Some(*http)
    });
    if let Some(endpoint) = uniform {
        return endpoint.to_string();
    }

    endpoints
        .iter()
        .map(|(protocol, endpoint)| format!("{protocol}={endpoint}"))
        .collect::<Vec<_>>()
        .join(";")
}
