//! Announcement listener.
//!
//! Binds the announcement port on all IPv4 addresses and feeds every
//! datagram whose UDP source matches its embedded origin address into the
//! peer registry. Everything else on a shared broadcast segment is noise and
//! is dropped at trace level.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use beacon_core::wire;
use beacon_services::{PeerRegistry, Registration};

/// Listen for announcements and populate the peer registry.
///
/// Runs until the task is dropped.
pub async fn listener_loop(registry: PeerRegistry, port: u16, buffer_len: usize) -> Result<()> {
    let socket = make_listener_socket(port).context("failed to create listener socket")?;
    let socket = UdpSocket::from_std(socket).context("failed to convert to tokio UdpSocket")?;

    tracing::info!(port, "announcement listener starting");

    receive_loop(&socket, &registry, buffer_len).await
}

/// Receive from an already-bound socket forever.
pub async fn receive_loop(socket: &UdpSocket, registry: &PeerRegistry, buffer_len: usize) -> Result<()> {
    let mut buf = vec![0u8; buffer_len];

    loop {
        let (len, peer_addr) = match socket.recv_from(&mut buf).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "recv_from failed");
                continue;
            }
        };
        handle_datagram(registry, &buf[..len], peer_addr);
    }
}

/// Filter one datagram by source and hand it to the registry.
/// Returns `None` if the transport check rejected it.
pub fn handle_datagram(
    registry: &PeerRegistry,
    payload: &[u8],
    source: SocketAddr,
) -> Option<Registration> {
    let SocketAddr::V4(source) = source else {
        tracing::trace!(%source, "ignoring non-IPv4 datagram");
        return None;
    };
    if !source_matches(payload, *source.ip()) {
        tracing::trace!(%source, "origin address does not match sender, ignoring");
        return None;
    }

    let outcome = registry.register_announcement(payload);
    match outcome {
        Registration::Discovered(_) => {
            tracing::info!(%source, peers = registry.len(), "new peer");
        }
        Registration::Refreshed => tracing::trace!(%source, "peer refreshed"),
        Registration::Malformed
        | Registration::SelfEcho
        | Registration::SourceFlood
        | Registration::NoRuntime => {
            tracing::trace!(%source, ?outcome, "announcement dropped");
        }
    }
    Some(outcome)
}

/// True if the payload claims to come from `sender`.
fn source_matches(payload: &[u8], sender: Ipv4Addr) -> bool {
    wire::peek_origin_address(payload) == Some(sender)
}

/// Create a UDP socket bound to the announcement port on every interface.
fn make_listener_socket(port: u16) -> Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;

    socket.set_reuse_address(true).context("SO_REUSEADDR")?;
    socket.set_broadcast(true).context("SO_BROADCAST")?;
    socket.set_nonblocking(true).context("set_nonblocking")?;

    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    socket.bind(&bind_addr.into()).context("bind()")?;

    Ok(socket.into())
}
