//! `[bridge]` section configuration.
//!
//! Websocket endpoint through which remote editor contexts join the bus.
//!
//! ```toml
//! [bridge]
//! enable = true
//! interface = "127.0.0.1"     # 0.0.0.0 to accept editors on the LAN
//! port = 5278                 # Next free port is used when taken
//! ```

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub enable: bool,
    pub interface: IpAddr,
    pub port: u16,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enable: true,
            interface: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5278,
        }
    }
}

impl BridgeConfig {
    pub const PORT: FieldPath = FieldPath::new("bridge.port");

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.enable && self.port == 0 {
            diag.error_with_hint(Self::PORT, "port 0 is reserved", "use 5278");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_bridge_defaults() {
        let config = test_parse_config("");
        assert!(config.bridge.enable);
        assert_eq!(config.bridge.interface, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.bridge.port, 5278);
    }

    #[test]
    fn test_bridge_interface_variants() {
        let config = test_parse_config("[bridge]\ninterface = \"::1\"\nport = 9000");
        assert!(config.bridge.interface.is_ipv6());
        assert_eq!(config.bridge.port, 9000);
    }

    #[test]
    fn test_port_zero_rejected_only_when_enabled() {
        let config = test_parse_config("[bridge]\nport = 0");
        let mut diag = ConfigDiagnostics::new();
        config.bridge.validate(&mut diag);
        assert_eq!(diag.len(), 1);

        let config = test_parse_config("[bridge]\nenable = false\nport = 0");
        let mut diag = ConfigDiagnostics::new();
        config.bridge.validate(&mut diag);
        assert!(diag.is_empty());
    }
}
