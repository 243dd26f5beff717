//! Roster display — prints the registry snapshot to stdout on an interval.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use beacon_services::{PeerRecord, PeerRegistry};

/// Printed under the roster on every refresh.
pub const SEPARATOR: &str = "_________________________";

/// Erase the screen and home the cursor.
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// One line per peer, then the separator.
pub fn render(records: &[PeerRecord]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&record.to_string());
        out.push('\n');
    }
    out.push_str(SEPARATOR);
    out.push('\n');
    out
}

/// Print the roster forever.
///
/// Runs until the task is dropped.
pub async fn display_loop(registry: PeerRegistry, interval: Duration, clear_screen: bool) -> Result<()> {
    let mut interval = tokio::time::interval(interval);

    loop {
        interval.tick().await;

        let frame = render(&registry.snapshot());
        let mut stdout = std::io::stdout().lock();
        if clear_screen {
            stdout.write_all(CLEAR_SCREEN.as_bytes()).context("write to stdout")?;
        }
        stdout.write_all(frame.as_bytes()).context("write to stdout")?;
        stdout.flush().context("flush stdout")?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::wire::HardwareId;
    use std::net::Ipv4Addr;

    #[test]
    fn empty_roster_is_just_the_separator() {
        assert_eq!(render(&[]), format!("{SEPARATOR}\n"));
    }

    #[test]
    fn renders_one_tab_separated_line_per_peer() {
        let records = vec![
            PeerRecord {
                address: Ipv4Addr::new(192, 168, 1, 4),
                hardware_id: HardwareId::new([0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]),
                display_name: "kitchen".to_string(),
                since_last_seen_ms: 412,
                skipped: 0,
            },
            PeerRecord {
                address: Ipv4Addr::new(192, 168, 1, 9),
                hardware_id: HardwareId::new([0xde, 0xad, 0xbe, 0xef, 0x00, 0x02]),
                display_name: "garage pi".to_string(),
                since_last_seen_ms: 6100,
                skipped: 3,
            },
        ];
        let text = render(&records);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "192.168.1.4\tDE:AD:BE:EF:00:01\tkitchen\t412\t0",
                "192.168.1.9\tDE:AD:BE:EF:00:02\tgarage pi\t6100\t3",
                SEPARATOR,
            ]
        );
    }
}
