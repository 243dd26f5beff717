//! Announcement transport — the UDP broadcast sender and receiver.
//!
//! The sender announces every local IPv4 address on its interface's
//! broadcast address. The receiver drops datagrams whose UDP source does
//! not match the address inside the payload, then hands the rest to the
//! peer registry.

pub mod broadcast;
pub mod listener;
