//! beacon-services — the peer roster: identities, heartbeat liveness, and
//! the registry that ties them together.

pub mod liveness;
pub mod peer;
pub mod registry;

pub use liveness::{HeartbeatWindow, LivenessPolicy, WINDOW_BITS};
pub use peer::{PeerIdentity, PeerRecord};
pub use registry::{CheckOutcome, Lineage, PeerRegistry, Registration};
