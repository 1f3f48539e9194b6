//! Environment variables derived from a [`ProxyState`].
//!
//! Every sink projects the same catalogue, so a key listed here is removed
//! from a sink even if the current state no longer produces a value for it.

use crate::types::{BypassList, Protocol, ProxyState};

pub const PROXY_KEYS: [&str; 8] = [
    "http_proxy",
    "HTTP_PROXY",
    "https_proxy",
    "HTTPS_PROXY",
    "ftp_proxy",
    "FTP_PROXY",
    "rsync_proxy",
    "RSYNC_PROXY",
];

pub const BYPASS_KEYS: [&str; 2] = ["no_proxy", "NO_PROXY"];

pub type Assignment = (&'static str, String);

/// Proxy variables for `state`, in catalogue order. Empty when the state is
/// disabled.
#[must_use]
pub fn proxy_assignments(state: &ProxyState) -> Vec<Assignment> {
    if !state.enabled() {
        return Vec::new();
    }
    let Some(http) = state.endpoint(Protocol::Http) else {
        return Vec::new();
    };
    let https = state.endpoint(Protocol::Https).unwrap_or(http);
    let ftp = state.endpoint(Protocol::Ftp).unwrap_or(http);

    let values = [
        http.url("http"),
        https.url("http"),
        ftp.url("ftp"),
        http.url("rsync"),
    ];

    PROXY_KEYS
        .chunks(2)
        .zip(values)
        .flat_map(|(keys, value)| keys.iter().map(move |key| (*key, value.clone())))
        .collect()
}

#[must_use]
pub fn bypass_assignments(bypass: &BypassList) -> Vec<Assignment> {
    if bypass.is_empty() {
        return Vec::new();
    }
    let value = bypass.joined(",");
    BYPASS_KEYS.iter().map(|key| (*key, value.clone())).collect()
}
