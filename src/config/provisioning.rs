use serde::{Deserialize, Serialize};

use crate::domain::AdvancedSecurity;

/// `[provisioning]` section: interfaces created on first start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    #[serde(default)]
    pub interfaces: Vec<ProvisioningInterface>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisioningInterface {
    pub identifier: String,
    pub display_name: String,
    /// server, client or any; empty means server
    pub mode: String,

    /// default: true
    pub enabled: Option<bool>,

    pub private_key: String,
    pub listen_port: u16,
    pub addresses: Vec<String>,

    pub dns: Vec<String>,
    pub dns_search: Vec<String>,

    pub mtu: u32,
    pub firewall_mark: u32,
    pub routing_table: String,

    pub pre_up: String,
    pub post_up: String,
    pub pre_down: String,
    pub post_down: String,

    /// default: enabled when `advanced.config_storage_path` is set
    pub save_config: Option<bool>,
    pub notes: String,

    pub peer_def_network: Vec<String>,
    pub peer_def_dns: Vec<String>,
    pub peer_def_dns_search: Vec<String>,
    pub peer_def_endpoint: String,
    pub peer_def_allowed_ips: Vec<String>,
    pub peer_def_mtu: u32,
    pub peer_def_persistent_keepalive: u32,
    pub peer_def_firewall_mark: u32,
    pub peer_def_routing_table: String,
    pub peer_def_pre_up: String,
    pub peer_def_post_up: String,
    pub peer_def_pre_down: String,
    pub peer_def_post_down: String,

    pub advanced_security: Option<AdvancedSecurity>,
}

impl ProvisioningInterface {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Default::default()
        }
    }
}
