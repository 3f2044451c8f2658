pub mod advanced_security;
pub mod context;
pub mod keys;

use std::fmt;

use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

pub use advanced_security::{AdvancedSecurity, ValidationWarning};
pub use context::{RequestContext, UserInfo};
pub use keys::KeyPair;

use crate::error::{AppError, Result};

pub const DEFAULT_MTU: u32 = 1420;

macro_rules! identifier {
    ($name:ident) => {
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

identifier!(InterfaceIdentifier);
identifier!(PeerIdentifier);
identifier!(UserIdentifier);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceMode {
    #[default]
    Server,
    Client,
    Any,
}

impl InterfaceMode {
    /// Parses a mode name, case insensitive. A blank value means `server`.
    pub fn parse_or_default(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "" | "server" => Some(InterfaceMode::Server),
            "client" => Some(InterfaceMode::Client),
            "any" => Some(InterfaceMode::Any),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InterfaceMode::Server => "server",
            InterfaceMode::Client => "client",
            InterfaceMode::Any => "any",
        }
    }
}

impl fmt::Display for InterfaceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which client implementation an interface needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientType {
    Native,
    ObfuscationCapable,
}

/// Rendering style requested from the template renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigStyle {
    #[default]
    WgQuick,
    Raw,
}

/// A peer setting with its inherited value and whether the peer may diverge
/// from the interface default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigOption<T> {
    pub value: T,
    pub overridable: bool,
}

impl<T> ConfigOption<T> {
    pub fn new(value: T, overridable: bool) -> Self {
        Self { value, overridable }
    }

    pub fn get_value(&self) -> &T {
        &self.value
    }
}

/// Values new peers of an interface inherit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerDefaults {
    pub network: Vec<IpNetwork>,
    pub dns: Vec<String>,
    pub dns_search: Vec<String>,
    pub endpoint: String,
    pub allowed_ips: Vec<IpNetwork>,
    pub mtu: u32,
    pub persistent_keepalive: u32,
    pub firewall_mark: u32,
    pub routing_table: String,
    pub pre_up: String,
    pub post_up: String,
    pub pre_down: String,
    pub post_down: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub identifier: InterfaceIdentifier,
    pub display_name: String,
    pub mode: InterfaceMode,
    pub key_pair: KeyPair,
    pub listen_port: u16,
    pub addresses: Vec<IpNetwork>,
    pub dns: Vec<String>,
    pub dns_search: Vec<String>,
    pub mtu: u32,
    pub firewall_mark: u32,
    pub routing_table: String,

    pub pre_up: String,
    pub post_up: String,
    pub pre_down: String,
    pub post_down: String,

    pub save_config: bool,
    pub disabled: bool,
    pub notes: String,

    pub peer_defaults: PeerDefaults,

    advanced_security: Option<AdvancedSecurity>,
}

impl Interface {
    pub fn new(identifier: InterfaceIdentifier) -> Self {
        Self {
            display_name: identifier.to_string(),
            identifier,
            mode: InterfaceMode::Server,
            key_pair: KeyPair::default(),
            listen_port: 0,
            addresses: Vec::new(),
            dns: Vec::new(),
            dns_search: Vec::new(),
            mtu: DEFAULT_MTU,
            firewall_mark: 0,
            routing_table: String::new(),
            pre_up: String::new(),
            post_up: String::new(),
            pre_down: String::new(),
            post_down: String::new(),
            save_config: false,
            disabled: false,
            notes: String::new(),
            peer_defaults: PeerDefaults::default(),
            advanced_security: None,
        }
    }

    pub fn advanced_security(&self) -> Option<&AdvancedSecurity> {
        self.advanced_security.as_ref()
    }

    /// Stores the block, an empty block is dropped.
    pub fn set_advanced_security(&mut self, params: Option<AdvancedSecurity>) {
        self.advanced_security = params.filter(|p| !p.is_empty());
    }

    pub fn has_advanced_security(&self) -> bool {
        self.advanced_security.as_ref().is_some_and(|p| !p.is_empty())
    }

    pub fn client_type(&self) -> ClientType {
        if self.has_advanced_security() {
            ClientType::ObfuscationCapable
        } else {
            ClientType::Native
        }
    }

    pub fn config_file_name(&self) -> String {
        format!("{}.conf", self.identifier)
    }
}

/// Interface side of a peer, i.e. what ends up in the client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerInterfaceConfig {
    pub key_pair: KeyPair,
    pub addresses: Vec<IpNetwork>,
    pub dns_str: ConfigOption<String>,
    pub dns_search_str: ConfigOption<String>,
    pub mtu: ConfigOption<u32>,
    pub firewall_mark: ConfigOption<u32>,
    pub routing_table: ConfigOption<String>,
    pub pre_up: ConfigOption<String>,
    pub post_up: ConfigOption<String>,
    pub pre_down: ConfigOption<String>,
    pub post_down: ConfigOption<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Peer {
    pub identifier: PeerIdentifier,
    pub display_name: String,
    pub user_identifier: UserIdentifier,
    pub interface_identifier: InterfaceIdentifier,
    pub disabled: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub notes: String,

    pub endpoint: ConfigOption<String>,
    pub endpoint_public_key: ConfigOption<String>,
    pub allowed_ips_str: ConfigOption<String>,
    pub extra_allowed_ips_str: String,
    pub preshared_key: String,
    pub persistent_keepalive: ConfigOption<u32>,

    pub interface: PeerInterfaceConfig,
}

impl Peer {
    /// New peer of `iface` with a fresh key pair, all settings inherited and
    /// overridable.
    pub fn new(identifier: PeerIdentifier, iface: &Interface) -> Self {
        let defaults = &iface.peer_defaults;
        let inherit_str = |v: &str| ConfigOption::new(v.to_string(), true);

        Self {
            identifier,
            interface_identifier: iface.identifier.clone(),
            endpoint: inherit_str(&defaults.endpoint),
            endpoint_public_key: inherit_str(&iface.key_pair.public_key),
            allowed_ips_str: inherit_str(&join_networks(&defaults.allowed_ips)),
            persistent_keepalive: ConfigOption::new(defaults.persistent_keepalive, true),
            interface: PeerInterfaceConfig {
                key_pair: KeyPair::generate(),
                dns_str: inherit_str(&defaults.dns.join(",")),
                dns_search_str: inherit_str(&defaults.dns_search.join(",")),
                mtu: ConfigOption::new(defaults.mtu, true),
                firewall_mark: ConfigOption::new(defaults.firewall_mark, true),
                routing_table: inherit_str(&defaults.routing_table),
                pre_up: inherit_str(&defaults.pre_up),
                post_up: inherit_str(&defaults.post_up),
                pre_down: inherit_str(&defaults.pre_down),
                post_down: inherit_str(&defaults.post_down),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

pub fn join_networks(networks: &[IpNetwork]) -> String {
    networks.iter().map(IpNetwork::to_string).collect::<Vec<_>>().join(",")
}

/// Parses a CIDR entry, rejecting blank values.
pub fn parse_cidr(raw: &str) -> Result<IpNetwork> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(AppError::Config("CIDR must not be empty".to_string()));
    }
    value
        .parse::<IpNetwork>()
        .map_err(|e| AppError::Config(format!("invalid CIDR {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!(InterfaceMode::parse_or_default(""), Some(InterfaceMode::Server));
        assert_eq!(InterfaceMode::parse_or_default("  "), Some(InterfaceMode::Server));
        assert_eq!(InterfaceMode::parse_or_default("Client"), Some(InterfaceMode::Client));
        assert_eq!(InterfaceMode::parse_or_default("any"), Some(InterfaceMode::Any));
        assert_eq!(InterfaceMode::parse_or_default("invalid"), None);
    }

    #[test]
    fn test_client_type_follows_advanced_security() {
        let mut iface = Interface::new(InterfaceIdentifier::from("awg0"));
        assert_eq!(iface.client_type(), ClientType::Native);

        iface.set_advanced_security(Some(AdvancedSecurity::default()));
        assert_eq!(iface.client_type(), ClientType::Native);
        assert!(iface.advanced_security().is_none());

        iface.set_advanced_security(Some(AdvancedSecurity {
            junk_packet_count: 4,
            ..Default::default()
        }));
        assert_eq!(iface.client_type(), ClientType::ObfuscationCapable);
        assert_eq!(iface.advanced_security().map(|p| p.junk_packet_count), Some(4));

        iface.set_advanced_security(None);
        assert_eq!(iface.client_type(), ClientType::Native);
    }

    #[test]
    fn test_new_peer_inherits_defaults() {
        let mut iface = Interface::new(InterfaceIdentifier::from("wg0"));
        iface.key_pair = KeyPair::generate();
        iface.peer_defaults.endpoint = "vpn.example.com:51820".to_string();
        iface.peer_defaults.dns = vec!["1.1.1.1".to_string(), "9.9.9.9".to_string()];
        iface.peer_defaults.allowed_ips = vec![parse_cidr("10.0.0.0/24").unwrap(), parse_cidr("::/0").unwrap()];
        iface.peer_defaults.persistent_keepalive = 16;

        let peer = Peer::new(PeerIdentifier::from("p1"), &iface);

        assert_eq!(peer.interface_identifier, iface.identifier);
        assert_eq!(peer.endpoint.get_value(), "vpn.example.com:51820");
        assert_eq!(peer.endpoint_public_key.get_value(), &iface.key_pair.public_key);
        assert_eq!(peer.allowed_ips_str.get_value(), "10.0.0.0/24,::/0");
        assert_eq!(peer.interface.dns_str.get_value(), "1.1.1.1,9.9.9.9");
        assert_eq!(*peer.persistent_keepalive.get_value(), 16);
        assert!(!peer.interface.key_pair.private_key.is_empty());
    }

    #[test]
    fn test_parse_cidr() {
        assert!(parse_cidr("10.0.0.1/24").is_ok());
        assert!(parse_cidr("fd00::1/64").is_ok());
        assert!(parse_cidr("10.0.0.1/33").is_err());
        assert!(parse_cidr(" ").is_err());
    }

    #[test]
    fn test_config_file_name() {
        let iface = Interface::new(InterfaceIdentifier::from("wg0"));
        assert_eq!(iface.config_file_name(), "wg0.conf");
    }
}
