//! Heartbeat liveness — a sliding window of recent check outcomes.
//!
//! Every check cadence each peer is asked "did we hear from you within the
//! staleness threshold?". The answer is shifted into a 10-bit window, newest
//! result at bit 0. A peer is dead only when all ten bits are zero, i.e.
//! after roughly ten cadences of continuous silence. Isolated packet loss
//! costs a bit or two but never flaps the roster.

use std::time::Duration;

use beacon_core::config::LivenessConfig;
use beacon_core::wire::{CHECK_CADENCE_MS, STALENESS_MS};
use tokio::time::Instant;

/// Number of checks remembered per peer.
pub const WINDOW_BITS: u32 = 10;

const WINDOW_MASK: u16 = (1 << WINDOW_BITS) - 1;

/// The last `WINDOW_BITS` check outcomes, 1 = heard, 0 = missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatWindow(u16);

impl HeartbeatWindow {
    /// All checks passed. New peers start here.
    pub const fn full() -> Self {
        Self(WINDOW_MASK)
    }

    /// Shift in one check outcome. Returns whether the peer is still alive.
    pub fn push(&mut self, heard: bool) -> bool {
        self.0 = ((self.0 << 1) | u16::from(heard)) & WINDOW_MASK;
        self.is_alive()
    }

    pub fn is_alive(&self) -> bool {
        self.0 != 0
    }

    /// Missed checks within the window.
    pub fn skipped(&self) -> u32 {
        WINDOW_BITS - self.0.count_ones()
    }

    pub fn bits(&self) -> u16 {
        self.0
    }
}

impl Default for HeartbeatWindow {
    fn default() -> Self {
        Self::full()
    }
}

/// Timing parameters for liveness checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessPolicy {
    /// Longest silence that still counts as heard.
    pub staleness: Duration,
    /// Delay between successive checks of one peer.
    pub check_cadence: Duration,
}

impl LivenessPolicy {
    /// True if `last_seen` is within the staleness threshold of `now`.
    /// The boundary is inclusive.
    pub fn heard(&self, last_seen: Instant, now: Instant) -> bool {
        now.saturating_duration_since(last_seen) <= self.staleness
    }
}

impl Default for LivenessPolicy {
    fn default() -> Self {
        Self {
            staleness: Duration::from_millis(STALENESS_MS),
            check_cadence: Duration::from_millis(CHECK_CADENCE_MS),
        }
    }
}

impl From<&LivenessConfig> for LivenessPolicy {
    fn from(config: &LivenessConfig) -> Self {
        Self {
            staleness: config.staleness(),
            check_cadence: config.check_cadence(),
        }
    }
}
