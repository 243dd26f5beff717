//! Beacon wire format — the announcement datagram.
//!
//! An announcement is a fixed 10-byte header followed by a NUL-terminated
//! display name:
//!
//! ```text
//! 0       4             10                  10+n  10+n+1
//! +-------+-------------+-------------------+-----+
//! | IPv4  | hardware id | display name (n)  | NUL |
//! +-------+-------------+-------------------+-----+
//! ```
//!
//! There is no magic, version or length field. Anything that does not parse
//! is foreign traffic or a truncated datagram and is dropped without comment,
//! so `decode` returns `Option` rather than `Result`.

use std::fmt;
use std::net::Ipv4Addr;

use bytes::{BufMut, Bytes, BytesMut};
use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Header ────────────────────────────────────────────────────────────────────

/// Fixed-size prefix of every announcement.
///
/// Wire size: 10 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct AnnouncementHeader {
    /// IPv4 address of the announcing interface, network byte order.
    pub origin_address: [u8; 4],

    /// Link-layer address of the announcing interface.
    /// This is the peer's identity; the address is display-only.
    pub hardware_id: [u8; 6],
}

assert_eq_size!(AnnouncementHeader, [u8; HEADER_LEN]);

// ── Hardware identifier ───────────────────────────────────────────────────────

/// 6-byte link-layer identifier. Equality and ordering are bytewise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HardwareId(pub [u8; 6]);

impl HardwareId {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl From<[u8; 6]> for HardwareId {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

/// Upper-case colon-separated hex, e.g. `0A:1B:2C:3D:4E:5F`.
impl fmt::Display for HardwareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

// ── Display name ──────────────────────────────────────────────────────────────

/// A display name that is guaranteed to survive a round trip through the
/// wire format: non-empty, at most `MAX_NAME_LEN` characters, each one of
/// `[A-Za-z0-9_- \t]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisplayName(String);

impl DisplayName {
    pub fn new(name: impl Into<String>) -> Result<Self, WireError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ' ' | '\t')
}

fn validate_name(name: &str) -> Result<(), WireError> {
    if name.is_empty() {
        return Err(WireError::EmptyName);
    }
    if let Some(bad) = name.chars().find(|c| !is_name_char(*c)) {
        return Err(WireError::InvalidNameChar(bad));
    }
    // Every accepted character is ASCII, so bytes == characters here.
    if name.len() > MAX_NAME_LEN {
        return Err(WireError::NameTooLong(name.len()));
    }
    Ok(())
}

// ── Announcement ──────────────────────────────────────────────────────────────

/// A decoded announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub origin_address: Ipv4Addr,
    pub hardware_id: HardwareId,
    pub display_name: DisplayName,
}

impl Announcement {
    pub fn new(origin_address: Ipv4Addr, hardware_id: HardwareId, display_name: DisplayName) -> Self {
        Self {
            origin_address,
            hardware_id,
            display_name,
        }
    }

    pub fn encode(&self) -> Bytes {
        encode(self.origin_address, self.hardware_id, &self.display_name)
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        decode(bytes)
    }
}

/// Serialize an announcement: header, name bytes, one NUL.
pub fn encode(origin_address: Ipv4Addr, hardware_id: HardwareId, display_name: &DisplayName) -> Bytes {
    let header = AnnouncementHeader {
        origin_address: origin_address.octets(),
        hardware_id: hardware_id.0,
    };
    let name = display_name.as_str().as_bytes();

    let mut buf = BytesMut::with_capacity(HEADER_LEN + name.len() + 1);
    buf.put_slice(header.as_bytes());
    buf.put_slice(name);
    buf.put_u8(0);
    buf.freeze()
}

/// Parse an announcement. Returns `None` for anything malformed: short
/// buffers, a missing terminator, an empty name, invalid UTF-8, or a name
/// outside the allowed character class or length.
///
/// Bytes after the first NUL are ignored.
pub fn decode(bytes: &[u8]) -> Option<Announcement> {
    let header = AnnouncementHeader::read_from_prefix(bytes)?;
    let origin_address = header.origin_address;
    let hardware_id = header.hardware_id;

    let tail = &bytes[HEADER_LEN..];
    let terminator = tail.iter().position(|&b| b == 0)?;
    if terminator == 0 {
        return None;
    }

    let name = std::str::from_utf8(&tail[..terminator]).ok()?;
    let display_name = DisplayName::new(name).ok()?;

    Some(Announcement {
        origin_address: Ipv4Addr::from(origin_address),
        hardware_id: HardwareId(hardware_id),
        display_name,
    })
}

/// Read only the origin address from a datagram, without validating the
/// rest. Used to match the payload against the UDP source address before
/// the full decode.
pub fn peek_origin_address(bytes: &[u8]) -> Option<Ipv4Addr> {
    let header = AnnouncementHeader::read_from_prefix(bytes)?;
    let origin_address = header.origin_address;
    Some(Ipv4Addr::from(origin_address))
}

// ── Constants ─────────────────────────────────────────────────────────────────

/// Size of the fixed announcement header.
pub const HEADER_LEN: usize = 10;

/// Maximum display name length in characters.
pub const MAX_NAME_LEN: usize = 100;

/// Shortest valid announcement: header, one name byte, NUL.
pub const MIN_DATAGRAM: usize = HEADER_LEN + 2;

/// Receive buffer size. Larger than any valid announcement.
pub const MAX_DATAGRAM: usize = 512;

/// Default UDP port for announcements.
pub const DEFAULT_PORT: u16 = 7777;

/// Default interval between broadcast rounds, in milliseconds.
/// Must stay below `STALENESS_MS`.
pub const ANNOUNCE_INTERVAL_MS: u64 = 1900;

/// Default staleness threshold, in milliseconds.
pub const STALENESS_MS: u64 = 2000;

/// Default interval between liveness checks for one peer, in milliseconds.
pub const CHECK_CADENCE_MS: u64 = 2000;

/// Default roster refresh interval, in milliseconds.
pub const DISPLAY_INTERVAL_MS: u64 = 2000;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Reasons a display name cannot be carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("display name is empty")]
    EmptyName,

    #[error("display name is {0} characters, maximum is {}", MAX_NAME_LEN)]
    NameTooLong(usize),

    #[error("display name contains disallowed character {0:?}")]
    InvalidNameChar(char),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
