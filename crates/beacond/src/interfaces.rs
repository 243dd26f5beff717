//! Local network interface enumeration.
//!
//! getifaddrs(3) returns one row per (interface, address family). Rows are
//! folded per interface name so each `LocalInterface` carries its link-layer
//! address together with all of its IPv4 addresses.

use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;

use anyhow::{Context, Result};
use nix::ifaddrs::getifaddrs;
use nix::net::if_::InterfaceFlags;

use beacon_core::wire::HardwareId;

/// One IPv4 address assigned to an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Binding {
    pub address: Ipv4Addr,
    /// Directed broadcast address, if the interface has one.
    pub broadcast: Option<Ipv4Addr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalInterface {
    pub name: String,
    pub hardware_id: Option<HardwareId>,
    pub ipv4: Vec<Ipv4Binding>,
    pub up: bool,
    pub loopback: bool,
}

impl LocalInterface {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            hardware_id: None,
            ipv4: Vec::new(),
            up: false,
            loopback: false,
        }
    }

    /// Up, not loopback, and has a hardware id to announce under.
    pub fn can_announce(&self) -> bool {
        self.up && !self.loopback && self.hardware_id.is_some()
    }
}

/// List every local interface, sorted by name.
pub fn enumerate() -> Result<Vec<LocalInterface>> {
    let mut by_name: BTreeMap<String, LocalInterface> = BTreeMap::new();

    for row in getifaddrs().context("getifaddrs()")? {
        let iface = by_name
            .entry(row.interface_name.clone())
            .or_insert_with(|| LocalInterface::named(&row.interface_name));
        iface.up |= row.flags.contains(InterfaceFlags::IFF_UP);
        iface.loopback |= row.flags.contains(InterfaceFlags::IFF_LOOPBACK);

        let Some(address) = row.address else {
            continue;
        };

        if let Some(link) = address.as_link_addr() {
            // Loopback reports an all-zero link address; that is not an identity.
            if let Some(mac) = link.addr().filter(|mac| *mac != [0u8; 6]) {
                iface.hardware_id = Some(HardwareId::new(mac));
            }
        } else if let Some(sin) = address.as_sockaddr_in() {
            let broadcast = row
                .broadcast
                .as_ref()
                .and_then(|b| b.as_sockaddr_in())
                .map(|b| b.ip());
            iface.ipv4.push(Ipv4Binding {
                address: sin.ip(),
                broadcast,
            });
        }
    }

    Ok(by_name.into_values().collect())
}

/// Every hardware id this host owns. Announcements carrying one of these
/// are our own broadcasts coming back.
pub fn self_hardware_ids(interfaces: &[LocalInterface]) -> HashSet<HardwareId> {
    interfaces.iter().filter_map(|i| i.hardware_id).collect()
}
