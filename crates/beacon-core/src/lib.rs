//! beacon-core — announcement wire format and shared configuration.
//! All other beacon crates depend on this one.

pub mod config;
pub mod wire;

pub use wire::{Announcement, DisplayName, HardwareId, WireError};
