use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::IpNetwork;

use crate::error::{AppError, Result};

/// Hands out listen ports and address blocks for new interfaces.
///
/// Allocation is sequential: ports count up from the start port and blocks
/// move forward in steps of the start block's size, skipping everything
/// reserved or handed out before.
#[derive(Debug, Clone)]
pub struct ResourceAllocator {
    next_port: u16,
    used_ports: HashSet<u16>,
    start_v4: IpNetwork,
    start_v6: Option<IpNetwork>,
    used_networks: Vec<IpNetwork>,
}

impl ResourceAllocator {
    pub fn new(start_port: u16, start_v4: IpNetwork, start_v6: Option<IpNetwork>) -> Result<Self> {
        if !start_v4.is_ipv4() {
            return Err(AppError::Config(format!("start block {start_v4} is not an IPv4 network")));
        }
        if let Some(v6) = start_v6 {
            if !v6.is_ipv6() {
                return Err(AppError::Config(format!("start block {v6} is not an IPv6 network")));
            }
        }

        Ok(Self {
            next_port: start_port,
            used_ports: HashSet::new(),
            start_v4: normalize(start_v4),
            start_v6: start_v6.map(normalize),
            used_networks: Vec::new(),
        })
    }

    pub fn reserve_port(&mut self, port: u16) {
        self.used_ports.insert(port);
    }

    pub fn reserve_networks(&mut self, networks: &[IpNetwork]) {
        self.used_networks.extend(networks.iter().copied().map(normalize));
    }

    pub fn allocate_port(&mut self) -> Result<u16> {
        let mut port = self.next_port;
        while port == 0 || self.used_ports.contains(&port) {
            port = port
                .checked_add(1)
                .ok_or_else(|| AppError::Config("no free listen port left".to_string()))?;
        }

        self.used_ports.insert(port);
        self.next_port = port.saturating_add(1);
        Ok(port)
    }

    /// Next free IPv4 block, plus an IPv6 block when configured. The returned
    /// addresses are the first host of each block.
    pub fn allocate_addresses(&mut self) -> Result<Vec<IpNetwork>> {
        let mut addresses = Vec::with_capacity(2);

        let v4 = self.next_free_block(self.start_v4)?;
        addresses.push(first_host(v4)?);
        self.used_networks.push(v4);

        if let Some(start_v6) = self.start_v6 {
            let v6 = self.next_free_block(start_v6)?;
            addresses.push(first_host(v6)?);
            self.used_networks.push(v6);
        }

        Ok(addresses)
    }

    fn next_free_block(&self, start: IpNetwork) -> Result<IpNetwork> {
        let mut candidate = start;
        while self.used_networks.iter().any(|used| overlaps(used, &candidate)) {
            candidate = next_block(candidate)
                .ok_or_else(|| AppError::Config(format!("no free network left after {start}")))?;
        }
        Ok(candidate)
    }
}

fn normalize(net: IpNetwork) -> IpNetwork {
    IpNetwork::new(net.network(), net.prefix()).unwrap_or(net)
}

fn overlaps(a: &IpNetwork, b: &IpNetwork) -> bool {
    a.is_ipv4() == b.is_ipv4() && (a.contains(b.network()) || b.contains(a.network()))
}

fn next_block(net: IpNetwork) -> Option<IpNetwork> {
    let prefix = net.prefix();
    let next = match net.network() {
        IpAddr::V4(addr) => {
            let step = 1u32.checked_shl(32 - u32::from(prefix))?;
            IpAddr::V4(Ipv4Addr::from(u32::from(addr).checked_add(step)?))
        }
        IpAddr::V6(addr) => {
            let step = 1u128.checked_shl(128 - u32::from(prefix))?;
            IpAddr::V6(Ipv6Addr::from(u128::from(addr).checked_add(step)?))
        }
    };
    IpNetwork::new(next, prefix).ok()
}

fn first_host(net: IpNetwork) -> Result<IpNetwork> {
    let host = match net {
        IpNetwork::V4(v4) if v4.prefix() < 31 => IpAddr::V4(Ipv4Addr::from(u32::from(v4.network()) + 1)),
        IpNetwork::V6(v6) if v6.prefix() < 127 => IpAddr::V6(Ipv6Addr::from(u128::from(v6.network()) + 1)),
        other => other.network(),
    };
    IpNetwork::new(host, net.prefix()).map_err(|e| AppError::Config(format!("invalid address in {net}: {e}")))
}
