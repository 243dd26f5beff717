use std::net::Ipv4Addr;
use std::time::Duration;

use beacon_core::wire::{self, DisplayName, HardwareId};
use beacon_services::Registration;
use tokio::time::sleep;

use crate::*;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[tokio::test(start_paused = true)]
async fn test_roster_tracks_join_and_leave() {
    let reg = local_registry(2);
    let alpha = RemoteHost::new(1, "alpha").unwrap();
    let bravo = RemoteHost::new(2, "bravo").unwrap();

    // Both announce every 1.9s for ten seconds, then bravo goes quiet.
    for _ in 0..6 {
        reg.register_announcement(&alpha.announcement());
        reg.register_announcement(&bravo.announcement());
        sleep(ms(1900)).await;
    }
    assert_eq!(reg.len(), 2);

    for _ in 0..20 {
        reg.register_announcement(&alpha.announcement());
        sleep(ms(1900)).await;
    }

    let snap = reg.snapshot();
    assert_eq!(snap.len(), 1, "bravo evicted after ~20s of silence");
    assert_eq!(snap[0].hardware_id, alpha.hardware_id);
    assert_eq!(snap[0].skipped, 0);
    assert_eq!(reg.active_checks(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_roster_orders_flaky_peers_last() {
    let reg = local_registry(2);
    let steady = RemoteHost::new(1, "steady").unwrap();
    let flaky = RemoteHost::new(2, "flaky").unwrap();

    reg.register_announcement(&steady.announcement());
    reg.register_announcement(&flaky.announcement());

    // flaky is heard on every third round only.
    for round in 0..12 {
        sleep(ms(1900)).await;
        reg.register_announcement(&steady.announcement());
        if round % 3 == 0 {
            reg.register_announcement(&flaky.announcement());
        }
    }

    let snap = reg.snapshot();
    assert_eq!(snap.len(), 2, "intermittent loss does not evict");
    assert_eq!(snap[0].display_name, "steady");
    assert_eq!(snap[1].display_name, "flaky");
    assert!(snap[1].skipped > 0);
}

#[tokio::test(start_paused = true)]
async fn test_own_broadcast_echo_never_listed() {
    let reg = local_registry(1);
    let me = wire::encode(
        Ipv4Addr::new(10, 20, 0, 100),
        LOCAL_ID,
        &DisplayName::new("me").unwrap(),
    );

    for _ in 0..5 {
        assert_eq!(reg.register_announcement(&me), Registration::SelfEcho);
        sleep(ms(1900)).await;
    }
    assert!(reg.snapshot().is_empty());
    assert_eq!(reg.active_checks(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_flood_under_one_address_is_capped() {
    let reg = local_registry(2);
    let spoofed = Ipv4Addr::new(10, 20, 0, 66);

    let mut accepted = 0;
    for n in 0..50u8 {
        let bytes = wire::encode(
            spoofed,
            HardwareId::new([0x06, 0, 0, 0, 0, n]),
            &DisplayName::new(format!("fake{n}")).unwrap(),
        );
        if matches!(reg.register_announcement(&bytes), Registration::Discovered(_)) {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 2);
    assert_eq!(reg.count_at(spoofed), 2);

    // A legitimate host elsewhere still gets in.
    let real = RemoteHost::new(7, "real").unwrap();
    assert!(matches!(
        reg.register_announcement(&real.announcement()),
        Registration::Discovered(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_returning_peer_starts_fresh() {
    let reg = local_registry(2);
    let host = RemoteHost::new(3, "roamer").unwrap();

    reg.register_announcement(&host.announcement());
    sleep(ms(30_000)).await;
    assert!(reg.is_empty());

    let moved = RemoteHost {
        address: Ipv4Addr::new(10, 20, 0, 33),
        name: DisplayName::new("renamed").unwrap(),
        ..host.clone()
    };
    assert!(matches!(
        reg.register_announcement(&moved.announcement()),
        Registration::Discovered(_)
    ));

    let record = reg.get(&host.hardware_id).unwrap();
    assert_eq!(record.display_name, "renamed");
    assert_eq!(record.address, Ipv4Addr::new(10, 20, 0, 33));
    assert_eq!(record.skipped, 0);
    assert_eq!(reg.active_checks(), 1);
}
