mod allocator;
mod validate;

use std::sync::Arc;

use ipnetwork::IpNetwork;

pub use allocator::ResourceAllocator;
pub use validate::validate_provisioning_interfaces;

use crate::config::{AdvancedConfig, ConfigManager, ProvisioningConfig, ProvisioningInterface};
use crate::domain::{
    parse_cidr, Interface, InterfaceIdentifier, InterfaceMode, KeyPair, PeerDefaults, RequestContext, DEFAULT_MTU,
};
use crate::error::{Result, ValidationError};
use crate::event_bus::{Event, EventBus};
use crate::repository::WireguardRepository;

/// Creates the interfaces listed in the `[provisioning]` section on a fresh
/// installation.
pub struct InterfaceBootstrapper {
    cfg: Arc<ConfigManager>,
    db: Arc<dyn WireguardRepository>,
    bus: Arc<dyn EventBus>,
}

impl InterfaceBootstrapper {
    pub fn new(cfg: Arc<ConfigManager>, db: Arc<dyn WireguardRepository>, bus: Arc<dyn EventBus>) -> Self {
        Self { cfg, db, bus }
    }

    /// Returns `true` if interfaces were created. Nothing happens when the
    /// list is empty or any interface already exists.
    ///
    /// Interfaces are saved one by one; a failure stops the run and leaves the
    /// interfaces saved before it in place.
    pub async fn bootstrap(&self, ctx: &RequestContext, provisioning: &ProvisioningConfig) -> Result<bool> {
        ctx.validate_admin_access()?;

        if provisioning.interfaces.is_empty() {
            return Ok(false);
        }

        ctx.check_cancelled()?;
        let existing = self
            .db
            .list_interfaces(ctx)
            .await
            .map_err(|e| e.context("failed to list existing interfaces"))?;
        if !existing.is_empty() {
            tracing::info!(
                "Skipping interface provisioning, {} interfaces already exist",
                existing.len()
            );
            return Ok(false);
        }

        for warning in validate_provisioning_interfaces(&provisioning.interfaces)? {
            tracing::warn!(field = %warning.field, "provisioning: {}", warning.message);
        }

        let cfg = self.cfg.get();
        let mut allocator = new_allocator(&cfg.advanced, &provisioning.interfaces)?;

        for entry in &provisioning.interfaces {
            let iface = build_interface(&cfg.advanced, entry, &mut allocator)?;

            ctx.check_cancelled()?;
            self.db
                .save_interface(ctx, &iface)
                .await
                .map_err(|e| e.context(format!("failed to save interface {}", iface.identifier)))?;

            tracing::info!(
                identifier = %iface.identifier,
                listen_port = iface.listen_port,
                client_type = ?iface.client_type(),
                "Provisioned interface"
            );
            self.bus.publish(Event::InterfaceCreated(iface)).await;
        }

        Ok(true)
    }
}

/// Allocator seeded with every port and address the entries set explicitly,
/// so generated values never collide with a later explicit one.
fn new_allocator(cfg: &AdvancedConfig, entries: &[ProvisioningInterface]) -> Result<ResourceAllocator> {
    let start_v4 = parse_cidr(&cfg.start_cidr_v4).map_err(|e| e.context("advanced.start_cidr_v4"))?;
    let start_v6 = if cfg.use_ip_v6 {
        Some(parse_cidr(&cfg.start_cidr_v6).map_err(|e| e.context("advanced.start_cidr_v6"))?)
    } else {
        None
    };

    let mut allocator = ResourceAllocator::new(cfg.start_listen_port, start_v4, start_v6)?;
    for entry in entries {
        if entry.listen_port != 0 {
            allocator.reserve_port(entry.listen_port);
        }
        allocator.reserve_networks(&parse_cidrs(&entry.addresses)?);
    }
    Ok(allocator)
}

fn build_interface(
    cfg: &AdvancedConfig,
    entry: &ProvisioningInterface,
    allocator: &mut ResourceAllocator,
) -> Result<Interface> {
    let id = entry.identifier.trim();
    let mut iface = Interface::new(InterfaceIdentifier::from(id));

    if !entry.display_name.trim().is_empty() {
        iface.display_name = entry.display_name.trim().to_string();
    }
    iface.mode = InterfaceMode::parse_or_default(&entry.mode).ok_or_else(|| {
        ValidationError::new(format!("provisioning.interfaces[{id}].mode"), "invalid mode")
    })?;
    iface.disabled = !entry.enabled.unwrap_or(true);

    iface.key_pair = if entry.private_key.trim().is_empty() {
        KeyPair::generate()
    } else {
        KeyPair::from_private_key(&entry.private_key).ok_or_else(|| {
            ValidationError::new(
                format!("provisioning.interfaces[{id}].private_key"),
                "must be a base64 encoded 32 byte key",
            )
        })?
    };

    iface.listen_port = match entry.listen_port {
        0 => allocator.allocate_port()?,
        port => port,
    };
    iface.addresses = match parse_cidrs(&entry.addresses)? {
        addresses if addresses.is_empty() => allocator.allocate_addresses()?,
        addresses => addresses,
    };

    iface.dns = entry.dns.clone();
    iface.dns_search = entry.dns_search.clone();
    iface.mtu = if entry.mtu == 0 { DEFAULT_MTU } else { entry.mtu };
    iface.firewall_mark = entry.firewall_mark;
    iface.routing_table = entry.routing_table.clone();
    iface.pre_up = entry.pre_up.clone();
    iface.post_up = entry.post_up.clone();
    iface.pre_down = entry.pre_down.clone();
    iface.post_down = entry.post_down.clone();
    iface.save_config = entry
        .save_config
        .unwrap_or_else(|| !cfg.config_storage_path.trim().is_empty());
    iface.notes = entry.notes.clone();

    let network = match parse_cidrs(&entry.peer_def_network)? {
        network if network.is_empty() => iface
            .addresses
            .iter()
            .filter_map(|addr| IpNetwork::new(addr.network(), addr.prefix()).ok())
            .collect(),
        network => network,
    };
    iface.peer_defaults = PeerDefaults {
        network,
        dns: entry.peer_def_dns.clone(),
        dns_search: entry.peer_def_dns_search.clone(),
        endpoint: entry.peer_def_endpoint.trim().to_string(),
        allowed_ips: parse_cidrs(&entry.peer_def_allowed_ips)?,
        mtu: entry.peer_def_mtu,
        persistent_keepalive: entry.peer_def_persistent_keepalive,
        firewall_mark: entry.peer_def_firewall_mark,
        routing_table: entry.peer_def_routing_table.clone(),
        pre_up: entry.peer_def_pre_up.clone(),
        post_up: entry.peer_def_post_up.clone(),
        pre_down: entry.peer_def_pre_down.clone(),
        post_down: entry.peer_def_post_down.clone(),
    };

    iface.set_advanced_security(entry.advanced_security.as_ref().map(|adv| adv.normalized()));

    Ok(iface)
}

fn parse_cidrs(raw: &[String]) -> Result<Vec<IpNetwork>> {
    raw.iter().map(|cidr| parse_cidr(cidr)).collect()
}
