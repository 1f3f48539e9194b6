//! Parsers for `networksetup` and `route` output.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkService {
    pub name: String,
    pub enabled: bool,
}

/// Parses `networksetup -listallnetworkservices`. Disabled services carry a
/// leading `*`, which is stripped from the name.
pub(crate) fn parse_network_services(output: &str) -> Vec<NetworkService> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("An asterisk"))
        .map(|line| match line.strip_prefix('*') {
            Some(name) => NetworkService {
                name: name.trim().to_string(),
                enabled: false,
            },
            None => NetworkService {
                name: line.to_string(),
                enabled: true,
            },
        })
        .collect()
}

/// The `interface:` of `route -n get default`, or `None` when offline.
pub(crate) fn parse_default_interface(output: &str) -> Option<String> {
    if output.contains("route: writing to routing socket") {
        return None;
    }
    output.lines().find_map(|line| {
        line.trim()
            .strip_prefix("interface:")
            .map(|device| device.trim().to_string())
            .filter(|device| !device.is_empty())
    })
}

/// Maps a device such as `en0` to its hardware port name using
/// `networksetup -listallhardwareports`.
pub(crate) fn service_for_device(output: &str, device: &str) -> Option<String> {
    let mut port = None;
    for line in output.lines().map(str::trim) {
        if let Some(name) = line.strip_prefix("Hardware Port:") {
            port = Some(name.trim());
        } else if let Some(found) = line.strip_prefix("Device:") {
            if found.trim() == device {
                return port.map(str::to_string);
            }
        }
    }
    None
}

/// One protocol's settings from `networksetup -get<flag>proxy`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyInfo {
    pub enabled: bool,
    pub server: String,
    pub port: u32,
}

impl ProxyInfo {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.server.is_empty() && self.port != 0
    }
}

pub(crate) fn parse_proxy_info(output: &str) -> ProxyInfo {
    let field = |key: &str| {
        output.lines().find_map(|line| {
            line.trim()
                .strip_prefix(key)
                .map(|value| value.trim().to_string())
        })
    };

    ProxyInfo {
        enabled: field("Enabled:").is_some_and(|value| value == "Yes"),
        server: field("Server:").unwrap_or_default(),
        port: field("Port:")
            .and_then(|value| value.parse().ok())
            .unwrap_or(0),
    }
}

/// Bypass domains from `networksetup -getproxybypassdomains`, without the
/// informational lines it prints when none are set.
pub(crate) fn parse_bypass_domains(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty()
                && !line.starts_with("There aren't any bypass domains")
                && !line.starts_with("An asterisk")
        })
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVICES: &str = "An asterisk (*) denotes that a network service is disabled.\n\
                            *Bluetooth PAN\n\
                            Wi-Fi\n\
                            Thunderbolt Bridge\n";

    const HARDWARE_PORTS: &str = "\n\
Hardware Port: Ethernet\n\
Device: en0\n\
Ethernet Address: 00:00:00:00:00:01\n\
\n\
Hardware Port: Wi-Fi\n\
Device: en1\n\
Ethernet Address: 00:00:00:00:00:02\n";

    #[test]
    fn services_skip_header_and_mark_disabled() {
        let services = parse_network_services(SERVICES);

        assert_eq!(services.len(), 3);
        assert_eq!(
            services[0],
            NetworkService {
                name: "Bluetooth PAN".to_string(),
                enabled: false
            }
        );
        assert!(services[1].enabled);
    }

    #[test]
    fn default_interface_from_route_output() {
        let output = "   route to: default\ndestination: default\n    gateway: 192.168.1.1\n  interface: en1\n";

        assert_eq!(parse_default_interface(output), Some("en1".to_string()));
        assert_eq!(
            parse_default_interface("route: writing to routing socket: not in table\n"),
            None
        );
    }

    #[test]
    fn device_maps_to_hardware_port() {
        assert_eq!(service_for_device(HARDWARE_PORTS, "en1"), Some("Wi-Fi".to_string()));
        assert_eq!(service_for_device(HARDWARE_PORTS, "en0"), Some("Ethernet".to_string()));
        assert_eq!(service_for_device(HARDWARE_PORTS, "utun3"), None);
    }

    #[test]
    fn proxy_info_ignores_authenticated_line() {
        let output = "Enabled: Yes\nServer: 10.0.0.5\nPort: 8080\nAuthenticated Proxy Enabled: 0\n";

        let info = parse_proxy_info(output);

        assert!(info.enabled);
        assert_eq!(info.server, "10.0.0.5");
        assert_eq!(info.port, 8080);
        assert!(!parse_proxy_info("Enabled: No\nServer: \nPort: 0\n").is_configured());
    }

    #[test]
    fn bypass_listing_drops_informational_lines() {
        assert!(
            parse_bypass_domains("There aren't any bypass domains set on Wi-Fi.\n").is_empty()
        );
        assert_eq!(
            parse_bypass_domains("*.local\n169.254/16\n\n"),
            vec!["*.local".to_string(), "169.254/16".to_string()]
        );
    }
}
