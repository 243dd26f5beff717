//! Peer identity — one discovered host, keyed on its hardware id.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::Ipv4Addr;

use beacon_core::wire::{Announcement, DisplayName, HardwareId};
use tokio::time::Instant;

use crate::liveness::{HeartbeatWindow, LivenessPolicy};

/// Tracked state for a discovered peer.
///
/// Identity is the hardware id alone. The name is fixed by the first
/// announcement; later announcements only move the address and refresh
/// `last_seen_at`. The heartbeat window is advanced by liveness checks,
/// never by announcements.
#[derive(Debug, Clone)]
pub struct PeerIdentity {
    address: Ipv4Addr,
    hardware_id: HardwareId,
    display_name: DisplayName,
    last_seen_at: Instant,
    window: HeartbeatWindow,
}

impl PeerIdentity {
    pub fn new(
        address: Ipv4Addr,
        hardware_id: HardwareId,
        display_name: DisplayName,
        now: Instant,
    ) -> Self {
        Self {
            address,
            hardware_id,
            display_name,
            last_seen_at: now,
            window: HeartbeatWindow::full(),
        }
    }

    /// Create from the first accepted announcement for this hardware id.
    pub fn from_announcement(announcement: Announcement, now: Instant) -> Self {
        Self::new(
            announcement.origin_address,
            announcement.hardware_id,
            announcement.display_name,
            now,
        )
    }

    /// A later announcement from the same peer arrived.
    pub fn record_announcement(&mut self, address: Ipv4Addr, now: Instant) {
        self.address = address;
        self.last_seen_at = now;
    }

    /// Run one liveness check. Returns false once the window is empty.
    pub fn evaluate_liveness(&mut self, policy: &LivenessPolicy, now: Instant) -> bool {
        self.window.push(policy.heard(self.last_seen_at, now))
    }

    pub fn skipped_count(&self) -> u32 {
        self.window.skipped()
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn hardware_id(&self) -> HardwareId {
        self.hardware_id
    }

    pub fn display_name(&self) -> &DisplayName {
        &self.display_name
    }

    pub fn last_seen_at(&self) -> Instant {
        self.last_seen_at
    }

    pub fn window(&self) -> HeartbeatWindow {
        self.window
    }

    /// Freeze the current state into a displayable record.
    pub fn record(&self, now: Instant) -> PeerRecord {
        let since = now.saturating_duration_since(self.last_seen_at);
        PeerRecord {
            address: self.address,
            hardware_id: self.hardware_id,
            display_name: self.display_name.as_str().to_string(),
            since_last_seen_ms: u64::try_from(since.as_millis()).unwrap_or(u64::MAX),
            skipped: self.skipped_count(),
        }
    }
}

impl PartialEq for PeerIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.hardware_id == other.hardware_id
    }
}

impl Eq for PeerIdentity {}

impl Hash for PeerIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hardware_id.hash(state);
    }
}

/// One roster line, as produced by `PeerRegistry::snapshot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    pub address: Ipv4Addr,
    pub hardware_id: HardwareId,
    pub display_name: String,
    pub since_last_seen_ms: u64,
    pub skipped: u32,
}

/// `address\tHH:HH:HH:HH:HH:HH\tname\tms-since-last-seen\tskipped`
impl fmt::Display for PeerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.address, self.hardware_id, self.display_name, self.since_last_seen_ms, self.skipped
        )
    }
}
