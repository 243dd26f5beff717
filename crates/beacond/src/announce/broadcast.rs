//! Announcement broadcast.
//!
//! Every interval, enumerates local interfaces and sends one announcement
//! per (interface, IPv4 address) to that address's directed broadcast.
//! Interfaces are re-read each round so addresses that come and go are
//! picked up without a restart.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time;

use beacon_core::wire::{self, DisplayName};

use crate::interfaces::{self, LocalInterface};

/// Broadcast this host's announcements on a regular interval.
///
/// Runs until the task is dropped.
pub async fn broadcast_loop(name: DisplayName, port: u16, interval: Duration) -> Result<()> {
    let socket = make_broadcast_socket().context("failed to create broadcast socket")?;
    let socket = UdpSocket::from_std(socket.into()).context("failed to convert to tokio UdpSocket")?;

    let mut interval = time::interval(interval);

    tracing::info!(
        port,
        name = %name,
        interval_ms = interval.period().as_millis() as u64,
        "announcement broadcast starting"
    );

    loop {
        interval.tick().await;

        let local = match interfaces::enumerate() {
            Ok(local) => local,
            Err(e) => {
                tracing::warn!(error = %e, "interface enumeration failed, skipping round");
                continue;
            }
        };

        for (dest, payload) in announcements(&local, &name, port) {
            match socket.send_to(&payload, SocketAddr::V4(dest)).await {
                Ok(n) => tracing::trace!(bytes = n, %dest, "announcement sent"),
                Err(e) => tracing::warn!(error = %e, %dest, "announcement send failed"),
            }
        }
    }
}

/// The datagrams one broadcast round sends, with their destinations.
pub fn announcements(
    interfaces: &[LocalInterface],
    name: &DisplayName,
    port: u16,
) -> Vec<(SocketAddrV4, Bytes)> {
    let mut out = Vec::new();
    for iface in interfaces.iter().filter(|i| i.can_announce()) {
        let Some(hardware_id) = iface.hardware_id else {
            continue;
        };
        for binding in &iface.ipv4 {
            let Some(broadcast) = binding.broadcast else {
                tracing::trace!(iface = %iface.name, addr = %binding.address, "no broadcast address");
                continue;
            };
            out.push((
                SocketAddrV4::new(broadcast, port),
                wire::encode(binding.address, hardware_id, name),
            ));
        }
    }
    out
}

/// Create a UDP socket allowed to send to broadcast addresses.
fn make_broadcast_socket() -> Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;

    socket.set_broadcast(true).context("SO_BROADCAST")?;
    socket.set_nonblocking(true).context("set_nonblocking")?;
    socket
        .bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0).into())
        .context("bind()")?;

    Ok(socket)
}
