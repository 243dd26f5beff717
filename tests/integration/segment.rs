//! Real UDP over loopback: announcements leave one socket and reach the
//! registry through another.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::Result;
use beacon_core::wire::{self, MAX_DATAGRAM};
use tokio::net::UdpSocket;

use crate::*;

#[tokio::test]
async fn test_loopback_announcement_reaches_roster() -> Result<()> {
    let reg = local_registry(2);
    let receiver = UdpSocket::bind("127.0.0.1:0").await?;
    let target = receiver.local_addr()?;
    let sender = UdpSocket::bind("127.0.0.1:0").await?;

    let host = RemoteHost {
        address: Ipv4Addr::LOCALHOST,
        ..RemoteHost::new(1, "loop")?
    };
    sender.send_to(&host.announcement(), target).await?;
    sender.send_to(b"not an announcement", target).await?;

    let mut buf = vec![0u8; MAX_DATAGRAM];
    for _ in 0..2 {
        let (len, source) =
            tokio::time::timeout(Duration::from_secs(5), receiver.recv_from(&mut buf)).await??;
        let payload = &buf[..len];
        let from_origin = match source {
            SocketAddr::V4(v4) => wire::peek_origin_address(payload) == Some(*v4.ip()),
            SocketAddr::V6(_) => false,
        };
        if from_origin {
            reg.register_announcement(payload);
        }
    }

    let snap = reg.snapshot();
    assert_eq!(snap.len(), 1);
    assert_eq!(snap[0].display_name, "loop");
    assert_eq!(snap[0].address, Ipv4Addr::LOCALHOST);
    assert_eq!(
        snap[0].to_string(),
        format!("127.0.0.1\t{}\tloop\t{}\t0", host.hardware_id, snap[0].since_last_seen_ms)
    );
    Ok(())
}
