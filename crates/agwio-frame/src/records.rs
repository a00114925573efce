//! Decoders for the two loosely-specified server record formats: port
//! capabilities ('g' replies) and heard-station records ('H' replies).

use bytes::Buf;
use time::{Date, Month, PrimitiveDateTime, Time};

use crate::error::{FrameError, Result};

/// Wire size of a port capabilities record.
pub const PORT_CAPS_SIZE: usize = 12;

/// Capabilities for a single port, as retrieved from the packet engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortCaps {
    /// Baud rate.
    pub baud_rate: u8,
    /// Traffic level, if the port is in autoupdate mode.
    pub traffic_level: u8,
    /// TX delay.
    pub tx_delay: u8,
    /// TX tail.
    pub tx_tail: u8,
    /// Persistence.
    pub persist: u8,
    /// Slot time.
    pub slot_time: u8,
    /// Maximum frames.
    pub max_frame: u8,
    /// Number of active connections.
    pub active_connections: u8,
    /// Number of bytes received in the last two minutes.
    pub bytes_received: u32,
}

impl PortCaps {
    /// Decode a record from exactly [`PORT_CAPS_SIZE`] bytes.
    pub fn decode(buffer: &[u8]) -> Result<Self> {
        if buffer.len() != PORT_CAPS_SIZE {
            return Err(FrameError::InvalidCapsLength { len: buffer.len() });
        }
        let mut buf = buffer;
        Ok(Self {
            baud_rate: buf.get_u8(),
            traffic_level: buf.get_u8(),
            tx_delay: buf.get_u8(),
            tx_tail: buf.get_u8(),
            persist: buf.get_u8(),
            slot_time: buf.get_u8(),
            max_frame: buf.get_u8(),
            active_connections: buf.get_u8(),
            bytes_received: buf.get_u32_le(),
        })
    }
}

/// Wire size of one binary timestamp record (Windows SYSTEMTIME layout).
const SYSTEMTIME_SIZE: usize = 16;

/// Shortest possible text portion carrying a callsign and two timestamps.
const MIN_TEXT_LEN: usize = "ID 615 925".len();

/// Record of a callsign heard on a port.
///
/// The "heard" times are carried twice: as free-form text inside the text
/// portion of the record, and (on servers that send them) as binary
/// timestamp blocks after it. The binary form is absent when the block is
/// missing, zeroed out, or implausible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeardCall {
    /// Callsign heard.
    pub callsign: String,
    /// When first heard, as text.
    pub first_heard: String,
    /// When first heard, as a calendar timestamp.
    pub first_heard_ts: Option<PrimitiveDateTime>,
    /// When last heard, as text.
    pub last_heard: String,
    /// When last heard, as a calendar timestamp.
    pub last_heard_ts: Option<PrimitiveDateTime>,
}

impl HeardCall {
    /// Decode one heard-station record.
    ///
    /// Returns `None` for empty or malformed records; several servers pad
    /// their reply lists with placeholder entries, so absence is a normal
    /// outcome rather than an error.
    pub fn decode(buffer: &[u8]) -> Option<Self> {
        let (text, tail) = split_at_nul(buffer);
        let (callsign, first_heard, last_heard) = parse_text(text)?;

        let (first_ts, last_ts) = if tail.len() >= SYSTEMTIME_SIZE * 2 {
            parse_timestamps(tail)
        } else {
            (None, None)
        };

        Some(Self {
            callsign,
            first_heard,
            first_heard_ts: first_ts,
            last_heard,
            last_heard_ts: last_ts,
        })
    }
}

fn split_at_nul(buffer: &[u8]) -> (&[u8], &[u8]) {
    match buffer.iter().position(|&b| b == 0) {
        Some(i) => (&buffer[..i], &buffer[i + 1..]),
        None => (buffer, &[]),
    }
}

fn parse_text(buffer: &[u8]) -> Option<(String, String, String)> {
    let text = std::str::from_utf8(buffer).ok()?;
    if text.len() < MIN_TEXT_LEN {
        return None;
    }
    let parts: Vec<&str> = text.split_whitespace().collect();
    // We need a minimum of 3 parts (callsign, first heard, last heard). A
    // timestamp may span multiple parts, but both span the same number, so
    // the total including the callsign must be odd. An even count is almost
    // certainly an empty record: callsign absent, timestamps present but
    // zeroed out.
    if parts.len() < 3 || parts.len() % 2 == 0 {
        return None;
    }
    if !valid_callsign(parts[0]) {
        return None;
    }
    // We don't know how many pieces comprise each timestamp, but there are
    // two of them, so halve the remainder and rejoin each half.
    let stamps = &parts[1..];
    let half = stamps.len() / 2;
    let first = stamps[..half].join(" ");
    let last = stamps[half..].join(" ");
    Some((parts[0].to_string(), first, last))
}

fn valid_callsign(call: &str) -> bool {
    let pieces: Vec<&str> = call.split('-').collect();
    // Base call, optionally followed by a single SSID.
    if pieces.len() > 2 {
        return false;
    }
    if pieces[0].is_empty() || !pieces[0].chars().all(char::is_alphanumeric) {
        return false;
    }
    if pieces.len() == 2 {
        let ssid = pieces[1];
        if ssid.is_empty() || !ssid.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        match ssid.parse::<u32>() {
            Ok(value) => value <= 15,
            Err(_) => false,
        }
    } else {
        true
    }
}

#[derive(Debug, Clone, Copy)]
struct SystemTime {
    year: u16,
    month: u16,
    day: u16,
    hour: u16,
    minute: u16,
    second: u16,
    millisecond: u16,
}

impl SystemTime {
    fn read(mut buf: &[u8]) -> Self {
        let year = buf.get_u16_le();
        let month = buf.get_u16_le();
        // Day-of-week field, unused.
        buf.advance(2);
        Self {
            year,
            month,
            day: buf.get_u16_le(),
            hour: buf.get_u16_le(),
            minute: buf.get_u16_le(),
            second: buf.get_u16_le(),
            millisecond: buf.get_u16_le(),
        }
    }

    fn to_datetime(self) -> Option<PrimitiveDateTime> {
        let month = Month::try_from(u8::try_from(self.month).ok()?).ok()?;
        let date =
            Date::from_calendar_date(i32::from(self.year), month, u8::try_from(self.day).ok()?)
                .ok()?;
        // The wire carries milliseconds; Time wants microseconds.
        let time = Time::from_hms_micro(
            u8::try_from(self.hour).ok()?,
            u8::try_from(self.minute).ok()?,
            u8::try_from(self.second).ok()?,
            u32::from(self.millisecond) * 1_000,
        )
        .ok()?;
        Some(PrimitiveDateTime::new(date, time))
    }
}

fn plausible_year(year: u16) -> bool {
    year > 2000 && year < 2200
}

/// Locate and convert the two timestamp records at the end of a heard
/// record.
///
/// Three known server behaviors:
/// * AGWPE puts extra NULs before the timestamps, so they sit at the tail.
/// * ldsped through v1.18 sends a correctly sized block that is all zeros.
/// * ldsped v1.19 and later sends a correctly sized block with real data.
fn parse_timestamps(buffer: &[u8]) -> (Option<PrimitiveDateTime>, Option<PrimitiveDateTime>) {
    let expected = SYSTEMTIME_SIZE * 2;
    let (ts1, ts2) = if buffer.len() == expected {
        let ts1 = SystemTime::read(&buffer[..SYSTEMTIME_SIZE]);
        let ts2 = SystemTime::read(&buffer[SYSTEMTIME_SIZE..expected]);
        if ts1.year == 0 && ts2.year == 0 {
            // Looks like old ldsped: block present, no data.
            return (None, None);
        }
        if !(plausible_year(ts1.year) && plausible_year(ts2.year)) {
            // Data looks bogus, no other options to try.
            return (None, None);
        }
        (ts1, ts2)
    } else {
        // Try the AGWPE case: data at the end, with leading NULs.
        let offset = buffer.len() - expected;
        let ts1 = SystemTime::read(&buffer[offset..offset + SYSTEMTIME_SIZE]);
        let ts2 = SystemTime::read(&buffer[offset + SYSTEMTIME_SIZE..offset + expected]);
        if plausible_year(ts1.year) && plausible_year(ts2.year) {
            (ts1, ts2)
        } else {
            // One last option: data at the front instead.
            let ts1 = SystemTime::read(&buffer[..SYSTEMTIME_SIZE]);
            let ts2 = SystemTime::read(&buffer[SYSTEMTIME_SIZE..expected]);
            if !(plausible_year(ts1.year) && plausible_year(ts2.year)) {
                return (None, None);
            }
            (ts1, ts2)
        }
    };

    match (ts1.to_datetime(), ts2.to_datetime()) {
        (Some(first), Some(last)) => (Some(first), Some(last)),
        _ => (None, None),
    }
}
