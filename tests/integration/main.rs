//! beacon integration test harness.
//!
//! These tests drive the codec and the registry together the way the daemon
//! does: bytes in, roster out. Time-dependent tests run on a paused Tokio
//! clock so liveness cadences are exact.

use std::net::Ipv4Addr;

use anyhow::Result;
use beacon_core::wire::{self, DisplayName, HardwareId};
use beacon_services::{LivenessPolicy, PeerRegistry};

mod roster;
mod segment;

// ── Harness ───────────────────────────────────────────────────────────────────

/// This host's own hardware id in every test.
pub const LOCAL_ID: HardwareId = HardwareId::new([0x02, 0x00, 0x5e, 0x00, 0x00, 0x01]);

/// A simulated remote host.
#[derive(Debug, Clone)]
pub struct RemoteHost {
    pub address: Ipv4Addr,
    pub hardware_id: HardwareId,
    pub name: DisplayName,
}

impl RemoteHost {
    pub fn new(last_octet: u8, name: &str) -> Result<Self> {
        Ok(Self {
            address: Ipv4Addr::new(10, 20, 0, last_octet),
            hardware_id: HardwareId::new([0x02, 0x00, 0x5e, 0x10, 0x00, last_octet]),
            name: DisplayName::new(name)?,
        })
    }

    /// The datagram this host broadcasts.
    pub fn announcement(&self) -> Vec<u8> {
        wire::encode(self.address, self.hardware_id, &self.name).to_vec()
    }
}

/// A registry for a host with `interfaces` local interfaces and default timing.
pub fn local_registry(interfaces: usize) -> PeerRegistry {
    PeerRegistry::new([LOCAL_ID], interfaces, LivenessPolicy::default())
}
