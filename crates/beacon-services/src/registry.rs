//! Peer registry — the live roster of peers heard on the local segment.
//!
//! All state sits behind one synchronous mutex. Registration, liveness
//! evaluation, eviction and snapshots each take it once and never hold it
//! across an await point, so a snapshot can never observe a peer half way
//! through eviction, and an announcement can never race a check on the same
//! peer.
//!
//! Every peer owns exactly one lineage of recurring liveness checks, started
//! when the peer is inserted. A lineage carries the id it was issued with;
//! if the stored entry no longer has that id (evicted, or evicted and
//! re-created by a fresh announcement) the lineage stops without touching
//! anything.

use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use beacon_core::wire::{self, Announcement, HardwareId};
use tokio::runtime::Handle;
use tokio::time::Instant;

use crate::liveness::LivenessPolicy;
use crate::peer::{PeerIdentity, PeerRecord};

/// Identifies one lineage of liveness checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lineage(u64);

/// What `register_announcement` did with a datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Not a valid announcement.
    Malformed,
    /// Our own announcement, heard back.
    SelfEcho,
    /// Too many distinct peers already claim this source address.
    SourceFlood,
    /// Known peer, timestamp refreshed.
    Refreshed,
    /// New peer inserted; its first check is due one cadence from now.
    Discovered(Lineage),
    /// No Tokio runtime to run liveness checks on. Nothing was changed.
    NoRuntime,
}

/// Result of one liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Still alive; check again after the cadence.
    Alive { skipped: u32 },
    /// Window emptied; the peer has been removed.
    Evicted,
    /// The lineage no longer owns an entry. Stop.
    Superseded,
}

struct Entry {
    peer: PeerIdentity,
    lineage: Lineage,
}

#[derive(Default)]
struct RosterState {
    // Ordered so snapshots are stable among peers with equal skip counts.
    entries: BTreeMap<HardwareId, Entry>,
    next_lineage: u64,
}

struct Shared {
    state: Mutex<RosterState>,
    self_ids: HashSet<HardwareId>,
    max_per_source: usize,
    policy: LivenessPolicy,
    active_checks: Arc<AtomicUsize>,
    // Runtime current at construction, used when registering from a
    // thread outside any runtime.
    runtime: Option<Handle>,
}

/// The peer registry, shared between the receive loop, the per-peer
/// liveness checks and the display.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct PeerRegistry {
    shared: Arc<Shared>,
}

impl PeerRegistry {
    /// `self_ids` are this host's own hardware ids; announcements carrying
    /// one are our own broadcasts echoed back. `max_per_source` bounds how
    /// many distinct peers may share a single origin address.
    pub fn new(
        self_ids: impl IntoIterator<Item = HardwareId>,
        max_per_source: usize,
        policy: LivenessPolicy,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(RosterState::default()),
                self_ids: self_ids.into_iter().collect(),
                max_per_source,
                policy,
                active_checks: Arc::new(AtomicUsize::new(0)),
                runtime: Handle::try_current().ok(),
            }),
        }
    }

    /// Feed one received datagram into the roster. Newly discovered peers
    /// get a recurring liveness check, spawned on the current Tokio runtime
    /// or else on the one the registry was created in.
    ///
    /// Returns `NoRuntime` without touching the roster if neither exists.
    pub fn register_announcement(&self, bytes: &[u8]) -> Registration {
        let Some(announcement) = wire::decode(bytes) else {
            return Registration::Malformed;
        };
        let Some(runtime) = Handle::try_current().ok().or_else(|| self.shared.runtime.clone()) else {
            tracing::warn!(peer = %announcement.hardware_id, "no tokio runtime for liveness checks");
            return Registration::NoRuntime;
        };
        // Timestamps must come from the clock the checks run against.
        let _enter = runtime.enter();

        let hardware_id = announcement.hardware_id;
        let outcome = self.admit(announcement, Instant::now());
        if let Registration::Discovered(lineage) = outcome {
            self.spawn_checks(&runtime, hardware_id, lineage);
        }
        outcome
    }

    /// Apply a datagram to the roster as of `now` without scheduling any
    /// checks.
    #[cfg(test)]
    fn accept(&self, bytes: &[u8], now: Instant) -> Registration {
        match wire::decode(bytes) {
            Some(announcement) => self.admit(announcement, now),
            None => Registration::Malformed,
        }
    }

    fn admit(&self, announcement: Announcement, now: Instant) -> Registration {
        let hardware_id = announcement.hardware_id;
        let address = announcement.origin_address;

        if self.shared.self_ids.contains(&hardware_id) {
            return Registration::SelfEcho;
        }

        let mut state = self.lock();

        // Peers that would claim this address once the announcement is in.
        let claimants = 1 + state
            .entries
            .values()
            .filter(|e| e.peer.address() == address && e.peer.hardware_id() != hardware_id)
            .count();
        if claimants > self.shared.max_per_source {
            return Registration::SourceFlood;
        }

        if let Some(entry) = state.entries.get_mut(&hardware_id) {
            entry.peer.record_announcement(address, now);
            return Registration::Refreshed;
        }

        let lineage = Lineage(state.next_lineage);
        state.next_lineage += 1;
        tracing::debug!(
            peer = %hardware_id,
            addr = %address,
            name = %announcement.display_name,
            "peer discovered"
        );
        state.entries.insert(
            hardware_id,
            Entry {
                peer: PeerIdentity::from_announcement(announcement, now),
                lineage,
            },
        );
        Registration::Discovered(lineage)
    }

    /// Run one liveness check for `hardware_id` on behalf of `lineage`.
    /// Evicts the peer if its window has emptied.
    pub fn evaluate(&self, hardware_id: &HardwareId, lineage: Lineage, now: Instant) -> CheckOutcome {
        let mut state = self.lock();

        let alive = match state.entries.get_mut(hardware_id) {
            Some(entry) if entry.lineage == lineage => entry
                .peer
                .evaluate_liveness(&self.shared.policy, now)
                .then(|| entry.peer.skipped_count()),
            _ => return CheckOutcome::Superseded,
        };

        match alive {
            Some(skipped) => CheckOutcome::Alive { skipped },
            None => {
                state.entries.remove(hardware_id);
                CheckOutcome::Evicted
            }
        }
    }

    /// All current peers, fewest missed checks first.
    pub fn snapshot(&self) -> Vec<PeerRecord> {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> Vec<PeerRecord> {
        let mut records: Vec<PeerRecord> = {
            let state = self.lock();
            state.entries.values().map(|e| e.peer.record(now)).collect()
        };
        // Stable: ties keep hardware-id order from the map.
        records.sort_by_key(|r| r.skipped);
        records
    }

    pub fn get(&self, hardware_id: &HardwareId) -> Option<PeerRecord> {
        self.lock()
            .entries
            .get(hardware_id)
            .map(|e| e.peer.record(Instant::now()))
    }

    pub fn contains(&self, hardware_id: &HardwareId) -> bool {
        self.lock().entries.contains_key(hardware_id)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Peers currently claiming `address`.
    pub fn count_at(&self, address: Ipv4Addr) -> usize {
        self.lock()
            .entries
            .values()
            .filter(|e| e.peer.address() == address)
            .count()
    }

    /// Liveness check lineages currently running.
    pub fn active_checks(&self) -> usize {
        self.shared.active_checks.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, RosterState> {
        // State is consistent after every critical section; a panic elsewhere
        // does not leave it torn.
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the recurring check for a newly inserted peer.
    ///
    /// The task holds only a weak reference, so dropping every registry
    /// handle ends all lineages at their next firing.
    fn spawn_checks(&self, runtime: &Handle, hardware_id: HardwareId, lineage: Lineage) {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let cadence = self.shared.policy.check_cadence;
        let guard = ActiveCheck::enter(self.shared.active_checks.clone());

        runtime.spawn(async move {
            let _guard = guard;
            loop {
                tokio::time::sleep(cadence).await;

                let Some(shared) = weak.upgrade() else {
                    return;
                };
                let registry = PeerRegistry { shared };

                match registry.evaluate(&hardware_id, lineage, Instant::now()) {
                    CheckOutcome::Alive { skipped } => {
                        tracing::trace!(peer = %hardware_id, skipped, "liveness check passed");
                    }
                    CheckOutcome::Evicted => {
                        tracing::info!(peer = %hardware_id, "peer evicted after sustained silence");
                        return;
                    }
                    CheckOutcome::Superseded => {
                        tracing::trace!(peer = %hardware_id, "stale liveness lineage stopped");
                        return;
                    }
                }
            }
        });
    }
}

/// Counts a running lineage for as long as it lives.
struct ActiveCheck(Arc<AtomicUsize>);

impl ActiveCheck {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveCheck {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
